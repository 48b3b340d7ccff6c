//! Verification of zipped bags.

use crate::builder::{BagInfo, PayloadOxum, LABEL_PAYLOAD_OXUM};
use crate::manifest::{self, md5_reader, MANIFEST_FILENAME, TAG_MANIFEST_FILENAME};
use crate::{BagError, BagResult, PAYLOAD_DIR};
use hsr_uuid::Md5Hash;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

/// Summary of a zipped bag that passed verification.
#[derive(Debug)]
pub struct BagVerification {
    /// Name of the archive's single top-level folder.
    pub top_folder: String,
    pub info: BagInfo,
    pub payload_oxum: PayloadOxum,
    /// Payload manifest entries as `(data/<path>, md5)`.
    pub manifest: Vec<(String, Md5Hash)>,
}

/// Checks a zipped bag's structure, payload checksums, `Payload-Oxum` and tag manifest.
///
/// # Errors
///
/// - [`BagError::InvalidBag`] for structural problems: several top-level folders, missing
///   `bagit.txt` or manifest, payload files absent from the manifest or vice versa, or a
///   `Payload-Oxum` that disagrees with the payload.
/// - [`BagError::ChecksumMismatch`] when a payload or tag file's MD5 differs from its
///   manifest entry.
pub fn verify_zipped_bag(zip_path: &Path) -> BagResult<BagVerification> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let top_folder = top_folder(&mut archive)?;
    let prefix = format!("{}/", top_folder);

    let bagit_txt = read_text(&mut archive, &format!("{}bagit.txt", prefix))?
        .ok_or_else(|| BagError::InvalidBag("missing bagit.txt".into()))?;
    let declaration = BagInfo::parse(&bagit_txt)?;
    if !declaration.contains("BagIt-Version") {
        return Err(BagError::InvalidBag(
            "bagit.txt does not declare BagIt-Version".into(),
        ));
    }

    let manifest_txt = read_text(&mut archive, &format!("{}{}", prefix, MANIFEST_FILENAME))?
        .ok_or_else(|| BagError::InvalidBag(format!("missing {}", MANIFEST_FILENAME)))?;
    let manifest = manifest::parse(&manifest_txt)?;

    let info = match read_text(&mut archive, &format!("{}bag-info.txt", prefix))? {
        Some(text) => BagInfo::parse(&text)?,
        None => BagInfo::new(),
    };

    let payload_prefix = format!("{}{}/", prefix, PAYLOAD_DIR);
    let mut actual: BTreeMap<String, (Md5Hash, u64)> = BTreeMap::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.name().strip_prefix(&prefix).map(str::to_owned) else {
            continue;
        };
        if !entry.name().starts_with(&payload_prefix) {
            continue;
        }
        let (hash, size) = md5_reader(entry)?;
        actual.insert(relative, (hash, size));
    }

    let expected: BTreeMap<&str, &Md5Hash> =
        manifest.iter().map(|(p, h)| (p.as_str(), h)).collect();

    for (path, (hash, _)) in &actual {
        match expected.get(path.as_str()) {
            None => {
                return Err(BagError::InvalidBag(format!(
                    "payload file {} is not in the manifest",
                    path
                )))
            }
            Some(want) if *want != hash => {
                return Err(BagError::ChecksumMismatch {
                    path: path.clone(),
                    expected: want.to_string(),
                    actual: hash.to_string(),
                })
            }
            Some(_) => {}
        }
    }
    for (path, _) in &manifest {
        if !actual.contains_key(path) {
            return Err(BagError::InvalidBag(format!(
                "manifest lists {} but the payload does not contain it",
                path
            )));
        }
    }

    let payload_oxum = PayloadOxum {
        bytes: actual.values().map(|(_, size)| size).sum(),
        files: actual.len() as u64,
    };
    if let Some(declared) = info.get(LABEL_PAYLOAD_OXUM) {
        let declared: PayloadOxum = declared.parse()?;
        if declared != payload_oxum {
            return Err(BagError::InvalidBag(format!(
                "Payload-Oxum {} does not match payload {}",
                declared, payload_oxum
            )));
        }
    }

    verify_tag_manifest(&mut archive, &prefix)?;

    Ok(BagVerification {
        top_folder,
        info,
        payload_oxum,
        manifest,
    })
}

fn verify_tag_manifest<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    prefix: &str,
) -> BagResult<()> {
    let Some(text) = read_text(archive, &format!("{}{}", prefix, TAG_MANIFEST_FILENAME))? else {
        return Ok(());
    };
    for (path, want) in manifest::parse(&text)? {
        let entry = match archive.by_name(&format!("{}{}", prefix, path)) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(BagError::InvalidBag(format!(
                    "tag manifest lists missing file {}",
                    path
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let (hash, _) = md5_reader(entry)?;
        if hash != want {
            return Err(BagError::ChecksumMismatch {
                path,
                expected: want.to_string(),
                actual: hash.to_string(),
            });
        }
    }
    Ok(())
}

/// Returns the single top-level folder every entry lives under.
fn top_folder<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> BagResult<String> {
    let mut top: Option<String> = None;
    for name in archive.file_names() {
        let first = name.split('/').next().unwrap_or_default();
        if first.is_empty() || first == name {
            return Err(BagError::InvalidBag(format!(
                "entry {} is not inside a bag folder",
                name
            )));
        }
        match &top {
            None => top = Some(first.to_owned()),
            Some(existing) if existing != first => {
                return Err(BagError::InvalidBag(
                    "archive has more than one top-level folder".into(),
                ))
            }
            Some(_) => {}
        }
    }
    top.ok_or_else(|| BagError::InvalidBag("archive is empty".into()))
}

fn read_text<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> BagResult<Option<String>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut text = String::new();
            entry.read_to_string(&mut text).map_err(|e| {
                BagError::InvalidBag(format!("{} is not valid UTF-8 text: {}", name, e))
            })?;
            Ok(Some(text))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{zip_directory, BagBuilder};
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn build_zip(temp: &TempDir) -> std::path::PathBuf {
        let bag_dir = temp.path().join("stage").join("2024.01.01.00.00.00");
        let mut builder = BagBuilder::create(&bag_dir).unwrap();
        builder.add_directory("visualization").unwrap();
        builder.add_bytes("contents/a.csv", b"1,2,3\n").unwrap();
        builder.add_bytes("resourcemetadata.json", b"{}").unwrap();
        builder
            .finish(BagInfo::new().with("title", "t").unwrap())
            .unwrap();

        let zip_path = temp.path().join("bag.zip");
        zip_directory(&bag_dir, &zip_path).unwrap();
        zip_path
    }

    #[test]
    fn verifies_a_freshly_built_bag() {
        let temp = TempDir::new().unwrap();
        let zip_path = build_zip(&temp);

        let report = verify_zipped_bag(&zip_path).unwrap();
        assert_eq!(report.top_folder, "2024.01.01.00.00.00");
        assert_eq!(report.payload_oxum, PayloadOxum { bytes: 8, files: 2 });
        assert_eq!(report.info.get("title"), Some("t"));
    }

    #[test]
    fn detects_tampered_payload() {
        let temp = TempDir::new().unwrap();
        let bag_dir = temp.path().join("stage").join("v");
        let mut builder = BagBuilder::create(&bag_dir).unwrap();
        builder.add_bytes("contents/a.csv", b"original").unwrap();
        builder.finish(BagInfo::new()).unwrap();

        fs::write(bag_dir.join("data/contents/a.csv"), b"tampered").unwrap();
        let zip_path = temp.path().join("bag.zip");
        zip_directory(&bag_dir, &zip_path).unwrap();

        let err = verify_zipped_bag(&zip_path).unwrap_err();
        assert!(matches!(err, BagError::ChecksumMismatch { .. }));
    }

    #[test]
    fn detects_unlisted_payload() {
        let temp = TempDir::new().unwrap();
        let bag_dir = temp.path().join("stage").join("v");
        let builder = BagBuilder::create(&bag_dir).unwrap();
        builder.finish(BagInfo::new()).unwrap();

        let mut extra = fs::File::create(bag_dir.join("data/extra.txt")).unwrap();
        extra.write_all(b"sneaky").unwrap();
        let zip_path = temp.path().join("bag.zip");
        zip_directory(&bag_dir, &zip_path).unwrap();

        let err = verify_zipped_bag(&zip_path).unwrap_err();
        assert!(matches!(err, BagError::InvalidBag(_)));
    }

    #[test]
    fn detects_payload_missing_from_archive() {
        let temp = TempDir::new().unwrap();
        let bag_dir = temp.path().join("stage").join("v");
        let mut builder = BagBuilder::create(&bag_dir).unwrap();
        builder.add_bytes("contents/a.csv", b"kept").unwrap();
        builder.add_bytes("contents/b.csv", b"removed").unwrap();
        builder.finish(BagInfo::new()).unwrap();

        fs::remove_file(bag_dir.join("data/contents/b.csv")).unwrap();
        let zip_path = temp.path().join("bag.zip");
        zip_directory(&bag_dir, &zip_path).unwrap();

        match verify_zipped_bag(&zip_path).unwrap_err() {
            BagError::InvalidBag(msg) => {
                assert!(msg.contains("data/contents/b.csv"), "{}", msg);
                assert!(msg.contains("payload does not contain it"), "{}", msg);
            }
            other => panic!("expected InvalidBag, got {:?}", other),
        }
    }

    #[test]
    fn detects_payload_oxum_mismatch() {
        let temp = TempDir::new().unwrap();
        let bag_dir = temp.path().join("stage").join("v");
        let mut builder = BagBuilder::create(&bag_dir).unwrap();
        builder.add_bytes("contents/a.csv", b"123456").unwrap();
        builder.finish(BagInfo::new()).unwrap();

        let info_path = bag_dir.join("bag-info.txt");
        let info = fs::read_to_string(&info_path).unwrap();
        assert!(info.contains("Payload-Oxum: 6.1\n"));
        fs::write(&info_path, info.replace("Payload-Oxum: 6.1", "Payload-Oxum: 7.1")).unwrap();
        let zip_path = temp.path().join("bag.zip");
        zip_directory(&bag_dir, &zip_path).unwrap();

        match verify_zipped_bag(&zip_path).unwrap_err() {
            BagError::InvalidBag(msg) => assert!(msg.contains("Payload-Oxum 7.1"), "{}", msg),
            other => panic!("expected InvalidBag, got {:?}", other),
        }
    }

    #[test]
    fn detects_tampered_tag_file() {
        let temp = TempDir::new().unwrap();
        let bag_dir = temp.path().join("stage").join("v");
        let mut builder = BagBuilder::create(&bag_dir).unwrap();
        builder.add_bytes("contents/a.csv", b"1,2,3\n").unwrap();
        builder.finish(BagInfo::new()).unwrap();

        let mut info = fs::OpenOptions::new()
            .append(true)
            .open(bag_dir.join("bag-info.txt"))
            .unwrap();
        info.write_all(b"Contact-Name: Mallory\n").unwrap();
        drop(info);
        let zip_path = temp.path().join("bag.zip");
        zip_directory(&bag_dir, &zip_path).unwrap();

        match verify_zipped_bag(&zip_path).unwrap_err() {
            BagError::ChecksumMismatch { path, .. } => assert_eq!(path, "bag-info.txt"),
            other => panic!("expected ChecksumMismatch, got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_bag_archive() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("stage").join("plain");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("readme.txt"), b"hi").unwrap();
        let zip_path = temp.path().join("plain.zip");
        zip_directory(&dir, &zip_path).unwrap();

        let err = verify_zipped_bag(&zip_path).unwrap_err();
        assert!(matches!(err, BagError::InvalidBag(_)));
    }
}
