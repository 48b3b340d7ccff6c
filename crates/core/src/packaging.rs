//! Packaging of resources as zipped BagIt archives.
//!
//! A bag snapshots one version of a resource. The version label is the record's `updated`
//! timestamp rendered `YYYY.MM.DD.HH.mm.ss`, which is also the archive's top-level folder:
//!
//! ```text
//! 2024.03.01.12.30.05/
//!   bagit.txt
//!   bag-info.txt
//!   manifest-md5.txt
//!   tagmanifest-md5.txt
//!   data/
//!     contents/<every resource file>
//!     visualization/
//!     resourcemetadata.json
//! ```
//!
//! Each bag is staged in its own temporary directory under the configured staging root,
//! so concurrent packaging of the same resource never shares a path. Staging state is
//! removed when packaging ends, whether it succeeded or not.

use crate::config::CoreConfig;
use crate::constants::{
    BAGS_DIR_NAME, BAG_CONTENTS_DIR, BAG_VISUALIZATION_DIR, RESOURCE_METADATA_JSON,
};
use crate::model::{BagRecord, Resource};
use crate::{ResourceError, ResourceResult};
use hsr_bagit::{md5_bytes, md5_file, zip_directory, BagBuilder, BagInfo, BagVerification};
use hsr_files::FilesService;
use std::fs;
use std::path::Path;

/// Owner identity written into `bag-info.txt`.
#[derive(Clone, Debug)]
pub(crate) struct BagAuthor {
    pub username: String,
    pub email: String,
}

/// Builds the bag for the resource's current version and stores it under
/// `<resource_dir>/bags/<version>.zip`.
///
/// The caller records the returned [`BagRecord`] on the resource.
pub(crate) fn create_bag(
    cfg: &CoreConfig,
    resource: &Resource,
    files: &FilesService,
    resource_dir: &Path,
    author: &BagAuthor,
) -> ResourceResult<BagRecord> {
    let version = resource.current_version();

    fs::create_dir_all(cfg.bag_temp_dir()).map_err(ResourceError::StorageDirCreation)?;
    let staging = tempfile::Builder::new()
        .prefix(&format!("{}-", resource.short_key))
        .tempdir_in(cfg.bag_temp_dir())
        .map_err(ResourceError::StorageDirCreation)?;

    let bag_dir = staging.path().join(version.to_string());
    tracing::debug!(staging = %bag_dir.display(), "staging bag");

    let mut builder = BagBuilder::create(&bag_dir)?;
    builder.add_directory(BAG_CONTENTS_DIR)?;
    builder.add_directory(BAG_VISUALIZATION_DIR)?;
    for file in &resource.files {
        let source = files.storage_path(&file.hash);
        builder.add_file(&format!("{}/{}", BAG_CONTENTS_DIR, file.name), &source)?;
    }

    let document = serde_json::to_vec_pretty(resource).map_err(ResourceError::Serialization)?;
    builder.add_bytes(RESOURCE_METADATA_JSON, &document)?;
    let bag = builder.finish(bag_info(cfg, resource, author)?)?;
    tracing::info!(
        resource = %resource.short_key,
        version = %version,
        payload_oxum = %bag.payload_oxum(),
        files = bag.manifest().len(),
        "bag built"
    );

    let archive_name = format!("{}.zip", version);
    let staged_zip = staging.path().join(&archive_name);
    zip_directory(&bag_dir, &staged_zip)?;

    let md5 = md5_file(&staged_zip)?;
    let size_bytes = fs::metadata(&staged_zip)
        .map_err(ResourceError::FileRead)?
        .len();

    let bags_dir = resource_dir.join(BAGS_DIR_NAME);
    fs::create_dir_all(&bags_dir).map_err(ResourceError::StorageDirCreation)?;
    move_file(&staged_zip, &bags_dir.join(&archive_name))?;

    staging.close().map_err(ResourceError::FileDelete)?;

    Ok(BagRecord {
        version,
        timestamp: resource.updated,
        filename: format!("{}/{}", BAGS_DIR_NAME, archive_name),
        md5,
        size_bytes,
    })
}

fn bag_info(cfg: &CoreConfig, resource: &Resource, author: &BagAuthor) -> ResourceResult<BagInfo> {
    let info = BagInfo::new()
        .with("title", resource.title.as_str())?
        .with("author", author.username.as_str())?
        .with("author_email", author.email.as_str())?
        .with("version", resource.current_version().to_string())?
        .with("resource_type", resource.resource_type.as_str())?
        .with("hydroshare_version", cfg.version_label())?
        .with("shortkey", resource.short_key.to_string())?
        .with("slug", resource.slug.as_str())?;
    Ok(info)
}

/// Reads a stored bag and checks it against the MD5 recorded for it.
pub(crate) fn read_stored_bag(resource_dir: &Path, record: &BagRecord) -> ResourceResult<Vec<u8>> {
    let path = resource_dir.join(&record.filename);
    let bytes = fs::read(&path).map_err(ResourceError::FileRead)?;
    let actual = md5_bytes(&bytes);
    if actual != record.md5 {
        return Err(ResourceError::BagChecksumMismatch {
            version: record.version.to_string(),
            expected: record.md5.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(bytes)
}

/// True if the archive a record points at is present on disk.
pub(crate) fn stored_bag_exists(resource_dir: &Path, record: &BagRecord) -> bool {
    resource_dir.join(&record.filename).is_file()
}

/// Verifies a zipped bag: structure, payload checksums and `Payload-Oxum`.
pub fn verify_bag(zip_path: &Path) -> ResourceResult<BagVerification> {
    Ok(hsr_bagit::verify_zipped_bag(zip_path)?)
}

fn move_file(from: &Path, to: &Path) -> ResourceResult<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Staging root may be on another filesystem.
    let partial = to.with_extension("zip.partial");
    fs::copy(from, &partial).map_err(ResourceError::FileWrite)?;
    fs::rename(&partial, to).map_err(ResourceError::FileWrite)?;
    fs::remove_file(from).map_err(ResourceError::FileDelete)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resource_types_from_env_value, CoreConfig};
    use crate::model::ResourceFile;
    use chrono::{TimeZone, Utc};
    use hsr_uuid::ShortKey;
    use std::io::Read;
    use tempfile::TempDir;

    fn cfg(temp: &TempDir) -> CoreConfig {
        CoreConfig::new(
            temp.path().join("data"),
            temp.path().join("staging"),
            resource_types_from_env_value(None).unwrap(),
            "R1 development".into(),
            "10.5072".into(),
        )
        .unwrap()
    }

    fn author() -> BagAuthor {
        BagAuthor {
            username: "alice".into(),
            email: "alice@example.org".into(),
        }
    }

    fn resource_with_file(root: &Path) -> (Resource, FilesService, std::path::PathBuf) {
        let key = ShortKey::new();
        let dir = key.sharded_dir(root);
        fs::create_dir_all(&dir).unwrap();
        let files = FilesService::new(root, key.clone()).unwrap();

        let updated = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let mut resource =
            Resource::new(key, "GenericResource", "Logan River", "alice", updated).unwrap();
        let blob = files.add_bytes(b"date,cfs\n2024-01-01,12\n").unwrap();
        resource.files.push(ResourceFile {
            name: "flow.csv".into(),
            hash: blob.hash,
            size_bytes: blob.size_bytes,
            media_type: Some("text/csv".into()),
            stored_at: updated,
        });
        (resource, files, dir)
    }

    #[test]
    fn create_bag_writes_verifiable_archive() {
        let temp = TempDir::new().unwrap();
        let cfg = cfg(&temp);
        let root = temp.path().join("resources");
        let (resource, files, dir) = resource_with_file(&root);

        let record = create_bag(&cfg, &resource, &files, &dir, &author()).unwrap();
        assert_eq!(record.version.to_string(), "2024.03.01.12.30.05");
        assert_eq!(record.filename, "bags/2024.03.01.12.30.05.zip");

        let zip_path = dir.join(&record.filename);
        assert_eq!(md5_file(&zip_path).unwrap(), record.md5);

        let report = verify_bag(&zip_path).unwrap();
        assert_eq!(report.top_folder, "2024.03.01.12.30.05");
        assert_eq!(report.info.get("shortkey"), Some(resource.short_key.to_string().as_str()));
        assert_eq!(report.info.get("hydroshare_version"), Some("R1 development"));
        assert_eq!(report.info.get("author_email"), Some("alice@example.org"));
        assert_eq!(report.info.get("slug"), Some("logan-river"));
        assert!(report
            .manifest
            .iter()
            .any(|(p, _)| p == "data/contents/flow.csv"));
        assert!(report
            .manifest
            .iter()
            .any(|(p, _)| p == "data/resourcemetadata.json"));

        let mut archive = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
        assert!(archive
            .by_name("2024.03.01.12.30.05/data/visualization/")
            .is_ok());
        let mut doc = String::new();
        archive
            .by_name("2024.03.01.12.30.05/data/resourcemetadata.json")
            .unwrap()
            .read_to_string(&mut doc)
            .unwrap();
        assert!(doc.contains("\"title\": \"Logan River\""));
    }

    #[test]
    fn staging_is_cleaned_up() {
        let temp = TempDir::new().unwrap();
        let cfg = cfg(&temp);
        let root = temp.path().join("resources");
        let (resource, files, dir) = resource_with_file(&root);

        create_bag(&cfg, &resource, &files, &dir, &author()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(cfg.bag_temp_dir()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn missing_blob_fails_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let cfg = cfg(&temp);
        let root = temp.path().join("resources");
        let (mut resource, files, dir) = resource_with_file(&root);
        resource.files[0].hash = hsr_uuid::Sha256Hash::from_bytes(&[7u8; 32]);

        let err = create_bag(&cfg, &resource, &files, &dir, &author()).unwrap_err();
        assert!(matches!(err, ResourceError::Bag(_)));
        let leftovers: Vec<_> = fs::read_dir(cfg.bag_temp_dir()).unwrap().collect();
        assert!(leftovers.is_empty());
        assert!(!dir.join("bags").exists());
    }

    #[test]
    fn read_stored_bag_detects_corruption() {
        let temp = TempDir::new().unwrap();
        let cfg = cfg(&temp);
        let root = temp.path().join("resources");
        let (resource, files, dir) = resource_with_file(&root);

        let record = create_bag(&cfg, &resource, &files, &dir, &author()).unwrap();
        assert!(stored_bag_exists(&dir, &record));
        assert!(read_stored_bag(&dir, &record).is_ok());

        fs::write(dir.join(&record.filename), b"corrupted").unwrap();
        assert!(matches!(
            read_stored_bag(&dir, &record),
            Err(ResourceError::BagChecksumMismatch { .. })
        ));
    }
}
