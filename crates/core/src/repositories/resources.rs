//! Resource management.
//!
//! [`ResourceService`] is the single entry point for reading and changing resources. It
//! handles:
//!
//! - Creation of new records under a freshly allocated short key
//! - Access control (owners, edit users and groups) for every mutation
//! - Payload files, stored as content-addressed blobs next to the record
//! - Bag generation on demand, at most once per resource version
//! - Publication, and versioning of published resources on further change
//!
//! ## Storage Layout
//!
//! ```text
//! resources/
//!   <s1>/
//!     <s2>/
//!       <short_key>/
//!         resource.yaml    # the record
//!         .git/            # history of resource.yaml
//!         files/           # payload blobs (untracked)
//!         bags/            # generated bags (untracked)
//! ```
//!
//! ## Published Resources
//!
//! A published record is never rewritten. A mutation of a published record creates a new
//! record under a new short key that `obsoletes` the old one; the old record gets
//! `obsoleted_by` and nothing else. The caller sees which record was changed through
//! [`Outcome::short_key`].
//!
//! ## Concurrency
//!
//! Core operations are synchronous and assume a single writer per record. Two concurrent
//! mutations of the same record are not coordinated; the later commit wins.

use crate::accounts::AccountRegistry;
use crate::author::{CommitAuthor, Requester};
use crate::config::CoreConfig;
use crate::constants::{DEFAULT_GITIGNORE, RESOURCE_YAML_FILENAME, SYSTEM_COMMIT_EMAIL};
use crate::model::{
    validate_file_name, validate_title, BagRecord, DublinCoreElement, Resource, ResourceFile,
    ResourceMap, ResourceSummary, ScienceMetadata, SystemMetadata,
};
use crate::packaging::{self, BagAuthor};
use crate::repositories::helpers::{create_unique_shared_dir, record_dirs};
use crate::upload::UploadedFile;
use crate::versioned_files::{
    CommitInfo, FileToWrite, HsrCommitAction, HsrCommitDomain, HsrCommitMessage,
    VersionedFileService,
};
use crate::{ResourceError, ResourceResult};
use chrono::{DateTime, Utc};
use hsr_bagit::BagVerification;
use hsr_files::FilesService;
use hsr_uuid::{Sha256Hash, ShortKey};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Input for [`ResourceService::create_resource`].
#[derive(Clone, Debug, Default)]
pub struct NewResource {
    pub resource_type: String,
    /// Username or email of the owner. Required when the requester is the system; a user
    /// requester always becomes the owner.
    pub owner: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub edit_users: Vec<String>,
    pub view_users: Vec<String>,
    pub edit_groups: Vec<String>,
    pub view_groups: Vec<String>,
    pub keywords: Vec<String>,
    pub dublin_metadata: Vec<DublinCoreElement>,
    pub files: Vec<UploadedFile>,
}

impl NewResource {
    pub fn new(resource_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Input for [`ResourceService::update_resource`].
///
/// Every provided collection replaces the stored one. `owner` adds an owner.
#[derive(Clone, Debug, Default)]
pub struct ResourceUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub edit_users: Option<Vec<String>>,
    pub view_users: Option<Vec<String>>,
    pub edit_groups: Option<Vec<String>>,
    pub view_groups: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub dublin_metadata: Option<Vec<DublinCoreElement>>,
    pub files: Option<Vec<UploadedFile>>,
}

/// Input for [`ResourceService::update_science_metadata`].
#[derive(Clone, Debug, Default)]
pub struct ScienceMetadataUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub dublin_metadata: Option<Vec<DublinCoreElement>>,
}

/// Result of a mutation.
///
/// `short_key` is the record that now holds the change. It differs from the requested one
/// when the requested record was published and a new version was created.
#[derive(Clone, Debug, Serialize)]
pub struct Outcome<T> {
    pub short_key: ShortKey,
    pub new_version: bool,
    pub value: T,
}

/// A bag archive and the record describing it.
#[derive(Clone, Debug)]
pub struct BagDownload {
    pub short_key: ShortKey,
    pub record: BagRecord,
    pub bytes: Vec<u8>,
}

impl BagDownload {
    /// Suggested download name: `<short_key>_<version>.zip`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.zip", self.short_key, self.record.version)
    }
}

/// The bytes of one logical file.
#[derive(Clone, Debug)]
pub struct FileContent {
    pub file: ResourceFile,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    Edit,
    Owner,
}

struct LoadedRecord {
    key: ShortKey,
    dir: PathBuf,
    resource: Resource,
    raw: String,
}

/// Stores upload bytes during a mutation and remembers what it stored, so blobs can be
/// released again if the mutation fails or they end up unreferenced.
struct BlobWriter<'a> {
    files: &'a FilesService,
    now: DateTime<Utc>,
    added: Vec<Sha256Hash>,
}

impl<'a> BlobWriter<'a> {
    fn new(files: &'a FilesService, now: DateTime<Utc>) -> Self {
        Self {
            files,
            now,
            added: Vec::new(),
        }
    }

    fn store(&mut self, name: &str, upload: &UploadedFile) -> ResourceResult<ResourceFile> {
        validate_file_name(name)?;
        let blob = self.files.add_bytes(&upload.bytes)?;
        self.added.push(blob.hash.clone());
        Ok(ResourceFile {
            name: name.to_string(),
            hash: blob.hash,
            size_bytes: blob.size_bytes,
            media_type: Some(upload.content_type.clone()),
            stored_at: self.now,
        })
    }

    /// Releases blobs stored by a failed mutation that `before` does not reference.
    fn discard(self, before: &Resource) {
        for hash in &self.added {
            if !before.references_blob(hash) {
                remove_blob(self.files, hash);
            }
        }
    }

    /// Releases blobs that `after` no longer references.
    fn finish(self, before: &Resource, after: &Resource) {
        let candidates = before.files.iter().map(|f| &f.hash).chain(self.added.iter());
        let mut released: Vec<&Sha256Hash> = Vec::new();
        for hash in candidates {
            if !after.references_blob(hash) && !released.contains(&hash) {
                remove_blob(self.files, hash);
                released.push(hash);
            }
        }
    }
}

fn remove_blob(files: &FilesService, hash: &Sha256Hash) {
    if let Err(e) = files.remove(hash) {
        tracing::warn!(%hash, error = %e, "failed to release blob");
    }
}

/// Service for resource records.
#[derive(Clone, Debug)]
pub struct ResourceService {
    cfg: Arc<CoreConfig>,
}

impl ResourceService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Loads the account registry for this data directory.
    pub fn accounts(&self) -> ResourceResult<AccountRegistry> {
        AccountRegistry::load(&self.cfg)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Creates a resource.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::Unauthenticated`] if a user requester is not registered.
    /// - [`ResourceError::UnknownResourceType`] if the type is not configured.
    /// - [`ResourceError::NotAuthorized`] if a user requester names someone else as owner.
    /// - [`ResourceError::InvalidInput`] on a bad title, file name or Dublin Core element, or
    ///   when the system creates a resource without an owner.
    /// - [`ResourceError::UserNotFound`] / [`ResourceError::GroupNotFound`] for unknown
    ///   entries in the access lists.
    /// - [`ResourceError::DuplicateFile`] if two uploads share a name.
    ///
    /// On failure after the record directory was allocated, the directory is removed.
    pub fn create_resource(
        &self,
        requester: &Requester,
        new: NewResource,
    ) -> ResourceResult<Resource> {
        let accounts = self.accounts()?;
        let author = CommitAuthor::for_requester(requester, &accounts)?;

        let resource_type = self
            .cfg
            .resource_type(new.resource_type.trim())
            .ok_or_else(|| ResourceError::UnknownResourceType(new.resource_type.clone()))?
            .name()
            .to_string();
        let owner = resolve_owner(requester, new.owner.as_deref(), &accounts)?;
        validate_title(&new.title)?;
        check_new_names(&[], new.files.iter().map(|f| f.name.as_str()))?;
        let dublin_metadata = validate_dublin(new.dublin_metadata)?;
        let edit_users = resolve_users(&accounts, &new.edit_users)?;
        let view_users = resolve_users(&accounts, &new.view_users)?;
        let edit_groups = resolve_groups(&accounts, &new.edit_groups)?;
        let view_groups = resolve_groups(&accounts, &new.view_groups)?;

        let message = HsrCommitMessage::new(
            HsrCommitDomain::Resource,
            HsrCommitAction::Create,
            "Resource created",
        )?
        .with_trailer("Resource-Type", resource_type.as_str())?
        .with_trailer("Files", new.files.len().to_string())?;

        let resources_dir = self.cfg.resources_dir();
        let (key, dir) = create_unique_shared_dir(&resources_dir, ShortKey::new)?;
        let now = Utc::now();

        let built: ResourceResult<(Resource, String)> = (|| {
            let mut resource = Resource::new(key.clone(), resource_type, &new.title, &owner, now)?;
            resource.set_description(new.description);
            resource.set_keywords(&new.keywords);
            resource.dublin_metadata = dublin_metadata;
            for user in &edit_users {
                resource.add_edit_user(user);
            }
            for user in &view_users {
                resource.add_view_user(user);
            }
            for group in &edit_groups {
                resource.add_edit_group(group);
            }
            for group in &view_groups {
                resource.add_view_group(group);
            }

            let files = self.files(&key)?;
            let mut writer = BlobWriter::new(&files, now);
            for upload in &new.files {
                let file = writer.store(&upload.name, upload)?;
                resource.files.push(file);
            }

            let raw = serde_yaml::to_string(&resource).map_err(ResourceError::YamlSerialization)?;
            Ok((resource, raw))
        })();

        let (resource, raw) = match built {
            Ok(built) => built,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    return Err(ResourceError::CleanupAfterInitialiseFailed {
                        path: dir,
                        init_error: Box::new(e),
                        cleanup_error: cleanup,
                    });
                }
                prune_empty_shards(&dir, &resources_dir);
                return Err(e);
            }
        };

        let files = [
            FileToWrite {
                relative_path: Path::new(".gitignore"),
                content: DEFAULT_GITIGNORE,
                old_content: None,
            },
            FileToWrite {
                relative_path: Path::new(RESOURCE_YAML_FILENAME),
                content: &raw,
                old_content: None,
            },
        ];
        if let Err(e) = VersionedFileService::init_and_commit(&dir, &author, &message, &files) {
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                tracing::warn!(path = %dir.display(), error = %cleanup, "failed to remove record dir");
            } else {
                prune_empty_shards(&dir, &resources_dir);
            }
            return Err(e);
        }

        tracing::info!(
            short_key = %resource.short_key,
            resource_type = %resource.resource_type,
            requester = %requester,
            "resource created"
        );
        Ok(resource)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Returns the full record.
    pub fn get_record(&self, pid: &str) -> ResourceResult<Resource> {
        Ok(self.load(pid)?.resource)
    }

    /// Returns the bag of the current version, creating it first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::BagChecksumMismatch`] if the stored archive no longer matches
    /// the MD5 recorded when it was created.
    pub fn get_resource(&self, pid: &str) -> ResourceResult<BagDownload> {
        let mut loaded = self.load(pid)?;
        let record = self.ensure_bag(&mut loaded, &CommitAuthor::system())?;
        let bytes = packaging::read_stored_bag(&loaded.dir, &record)?;
        Ok(BagDownload {
            short_key: loaded.key,
            record,
            bytes,
        })
    }

    pub fn get_science_metadata(&self, pid: &str) -> ResourceResult<ScienceMetadata> {
        Ok(self.load(pid)?.resource.science_metadata())
    }

    pub fn get_system_metadata(&self, pid: &str) -> ResourceResult<SystemMetadata> {
        Ok(self.load(pid)?.resource.system_metadata())
    }

    pub fn get_resource_map(&self, pid: &str) -> ResourceResult<ResourceMap> {
        Ok(self.load(pid)?.resource.resource_map())
    }

    /// Extra capabilities declared for the resource's type. Empty when the type declares
    /// none or is no longer configured.
    pub fn get_capabilities(&self, pid: &str) -> ResourceResult<Vec<String>> {
        let resource = self.load(pid)?.resource;
        Ok(self
            .cfg
            .resource_type(&resource.resource_type)
            .map(|spec| spec.capabilities().to_vec())
            .unwrap_or_default())
    }

    /// Returns the bytes of one file.
    pub fn get_resource_file(&self, pid: &str, filename: &str) -> ResourceResult<FileContent> {
        let loaded = self.load(pid)?;
        let file = loaded
            .resource
            .file(filename)
            .cloned()
            .ok_or_else(|| ResourceError::FileNotFound(filename.to_string()))?;
        let bytes = self.files(&loaded.key)?.read(&file.hash)?;
        Ok(FileContent { file, bytes })
    }

    /// The bags generated so far, oldest first.
    pub fn get_revisions(&self, pid: &str) -> ResourceResult<Vec<BagRecord>> {
        Ok(self.load(pid)?.resource.bags)
    }

    pub fn get_related(&self, pid: &str) -> ResourceResult<Vec<ShortKey>> {
        self.load(pid)?;
        Err(ResourceError::NotImplemented("related resources"))
    }

    /// MD5 of the current version's bag, creating the bag first if needed.
    pub fn get_checksum(&self, pid: &str) -> ResourceResult<String> {
        let mut loaded = self.load(pid)?;
        let record = self.ensure_bag(&mut loaded, &CommitAuthor::system())?;
        Ok(record.md5.to_string())
    }

    /// Summaries of every record, ordered by short key. Unreadable records are skipped.
    pub fn list_resources(&self) -> ResourceResult<Vec<ResourceSummary>> {
        let mut summaries = Vec::new();
        for (key, _) in record_dirs(&self.cfg.resources_dir()) {
            match self.load_key(key.clone()) {
                Ok(loaded) => summaries.push(loaded.resource.summary()),
                Err(e) => tracing::warn!(short_key = %key, error = %e, "skipping unreadable record"),
            }
        }
        Ok(summaries)
    }

    /// Finds the record a DOI was minted for. Accepts bare DOIs, `doi:` and
    /// `https://doi.org/` forms.
    pub fn resolve_doi(&self, doi: &str) -> ResourceResult<ShortKey> {
        let wanted = doi.trim();
        let wanted = wanted
            .strip_prefix("https://doi.org/")
            .or_else(|| wanted.strip_prefix("doi:"))
            .unwrap_or(wanted);

        for (key, _) in record_dirs(&self.cfg.resources_dir()) {
            match self.load_key(key.clone()) {
                Ok(loaded) if loaded.resource.doi.as_deref() == Some(wanted) => return Ok(key),
                Ok(_) => {}
                Err(e) => tracing::warn!(short_key = %key, error = %e, "skipping unreadable record"),
            }
        }
        Err(ResourceError::NotFound(format!("DOI {}", wanted)))
    }

    /// Commit history of the record, newest first.
    pub fn history(&self, pid: &str) -> ResourceResult<Vec<CommitInfo>> {
        let loaded = self.load(pid)?;
        VersionedFileService::open(&loaded.dir)?.history()
    }

    // ------------------------------------------------------------------
    // Bags
    // ------------------------------------------------------------------

    /// Creates the bag of the current version if it does not exist yet.
    pub fn create_bag(&self, requester: &Requester, pid: &str) -> ResourceResult<BagRecord> {
        let accounts = self.accounts()?;
        let author = CommitAuthor::for_requester(requester, &accounts)?;
        let mut loaded = self.load(pid)?;
        self.ensure_bag(&mut loaded, &author)
    }

    /// Checks the most recent stored bag against its recorded MD5 and its own manifests.
    pub fn verify_stored_bag(&self, pid: &str) -> ResourceResult<BagVerification> {
        let loaded = self.load(pid)?;
        let record = loaded.resource.bags.last().ok_or_else(|| {
            ResourceError::FileNotFound(format!("no bag has been created for {}", loaded.key))
        })?;
        packaging::read_stored_bag(&loaded.dir, record)?;
        packaging::verify_bag(&loaded.dir.join(&record.filename))
    }

    fn ensure_bag(
        &self,
        loaded: &mut LoadedRecord,
        author: &CommitAuthor,
    ) -> ResourceResult<BagRecord> {
        let version = loaded.resource.current_version();
        if let Some(existing) = loaded.resource.bag(&version) {
            if packaging::stored_bag_exists(&loaded.dir, existing) {
                return Ok(existing.clone());
            }
            tracing::warn!(short_key = %loaded.key, %version, "bag archive missing, rebuilding");
        }

        let accounts = self.accounts()?;
        let bag_author = bag_author(&loaded.resource, &accounts);
        let files = self.files(&loaded.key)?;
        let record =
            packaging::create_bag(&self.cfg, &loaded.resource, &files, &loaded.dir, &bag_author)?;

        let mut next = loaded.resource.clone();
        next.bags.retain(|b| b.version != version);
        next.bags.push(record.clone());

        let message = HsrCommitMessage::new(
            HsrCommitDomain::Bags,
            HsrCommitAction::Create,
            format!("Bag {} created", version),
        )?
        .with_trailer("Bag-MD5", record.md5.as_str())?;

        let raw = match commit_record(&loaded.dir, author, &message, &next, Some(&loaded.raw)) {
            Ok(raw) => raw,
            Err(e) => {
                remove_bag_archive(&loaded.dir, &record);
                return Err(e);
            }
        };
        loaded.resource = next;
        loaded.raw = raw;

        tracing::info!(short_key = %loaded.key, %version, md5 = %record.md5, "bag created");
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Updates a resource. Provided collections replace the stored ones.
    ///
    /// Adding an owner requires the requester to be an owner.
    pub fn update_resource(
        &self,
        requester: &Requester,
        pid: &str,
        update: ResourceUpdate,
    ) -> ResourceResult<Outcome<Resource>> {
        let access = if update.owner.is_some() {
            Access::Owner
        } else {
            Access::Edit
        };
        let message = HsrCommitMessage::new(
            HsrCommitDomain::Resource,
            HsrCommitAction::Update,
            "Resource updated",
        )?;

        let outcome = self.mutate(requester, pid, access, message, |resource, writer, accounts| {
            if let Some(title) = &update.title {
                resource.set_title(title)?;
            }
            if update.description.is_some() {
                resource.set_description(update.description);
            }
            if let Some(keywords) = &update.keywords {
                resource.set_keywords(keywords);
            }
            if let Some(dublin) = update.dublin_metadata {
                resource.dublin_metadata = validate_dublin(dublin)?;
            }

            if let Some(users) = &update.edit_users {
                resource.edit_users = resolve_users(accounts, users)?;
            }
            if let Some(users) = &update.view_users {
                resource.view_users = resolve_users(accounts, users)?;
            }
            if let Some(groups) = &update.edit_groups {
                resource.edit_groups = resolve_groups(accounts, groups)?;
            }
            if let Some(groups) = &update.view_groups {
                resource.view_groups = resolve_groups(accounts, groups)?;
            }
            if let Some(owner) = &update.owner {
                let owner = resolve_user(accounts, owner)?;
                resource.add_owner(&owner);
            }
            resource.restore_access_invariants();

            if let Some(uploads) = &update.files {
                check_new_names(&[], uploads.iter().map(|f| f.name.as_str()))?;
                let mut files = Vec::with_capacity(uploads.len());
                for upload in uploads {
                    files.push(writer.store(&upload.name, upload)?);
                }
                resource.files = files;
            }
            Ok(())
        })?;

        let resource = self.load_key(outcome.short_key.clone())?.resource;
        Ok(Outcome {
            short_key: outcome.short_key,
            new_version: outcome.new_version,
            value: resource,
        })
    }

    /// Updates title, description, keywords and Dublin Core elements.
    pub fn update_science_metadata(
        &self,
        requester: &Requester,
        pid: &str,
        update: ScienceMetadataUpdate,
    ) -> ResourceResult<Outcome<ScienceMetadata>> {
        let message = HsrCommitMessage::new(
            HsrCommitDomain::Metadata,
            HsrCommitAction::Update,
            "Science metadata updated",
        )?;

        self.mutate(requester, pid, Access::Edit, message, |resource, _, _| {
            if let Some(title) = &update.title {
                resource.set_title(title)?;
            }
            if update.description.is_some() {
                resource.set_description(update.description);
            }
            if let Some(keywords) = &update.keywords {
                resource.set_keywords(keywords);
            }
            if let Some(dublin) = update.dublin_metadata {
                resource.dublin_metadata = validate_dublin(dublin)?;
            }
            Ok(resource.science_metadata())
        })
    }

    /// System metadata is derived from the record; writable fields are the science metadata
    /// fields, so this delegates to [`update_science_metadata`](Self::update_science_metadata).
    pub fn update_system_metadata(
        &self,
        requester: &Requester,
        pid: &str,
        update: ScienceMetadataUpdate,
    ) -> ResourceResult<Outcome<ScienceMetadata>> {
        self.update_science_metadata(requester, pid, update)
    }

    /// Adds files. Names must be new to the resource.
    pub fn add_resource_files(
        &self,
        requester: &Requester,
        pid: &str,
        uploads: Vec<UploadedFile>,
    ) -> ResourceResult<Outcome<Vec<ResourceFile>>> {
        if uploads.is_empty() {
            return Err(ResourceError::InvalidInput("no files provided".into()));
        }
        let message = HsrCommitMessage::new(
            HsrCommitDomain::Files,
            HsrCommitAction::Create,
            format!("{} file(s) added", uploads.len()),
        )?;

        self.mutate(requester, pid, Access::Edit, message, |resource, writer, _| {
            check_new_names(&resource.files, uploads.iter().map(|f| f.name.as_str()))?;
            let mut added = Vec::with_capacity(uploads.len());
            for upload in &uploads {
                added.push(writer.store(&upload.name, upload)?);
            }
            resource.files.extend(added.iter().cloned());
            Ok(added)
        })
    }

    /// Replaces the bytes of an existing file. The stored name is kept; the upload's name is
    /// ignored.
    pub fn update_resource_file(
        &self,
        requester: &Requester,
        pid: &str,
        filename: &str,
        upload: UploadedFile,
    ) -> ResourceResult<Outcome<ResourceFile>> {
        let message = HsrCommitMessage::new(
            HsrCommitDomain::Files,
            HsrCommitAction::Update,
            "File replaced",
        )?
        .with_trailer("File", filename)?;

        self.mutate(requester, pid, Access::Edit, message, |resource, writer, _| {
            let index = resource
                .files
                .iter()
                .position(|f| f.name == filename)
                .ok_or_else(|| ResourceError::FileNotFound(filename.to_string()))?;
            let file = writer.store(filename, &upload)?;
            resource.files[index] = file.clone();
            Ok(file)
        })
    }

    /// Deletes one file and returns its name.
    pub fn delete_resource_file(
        &self,
        requester: &Requester,
        pid: &str,
        filename: &str,
    ) -> ResourceResult<Outcome<String>> {
        let message = HsrCommitMessage::new(
            HsrCommitDomain::Files,
            HsrCommitAction::Delete,
            "File deleted",
        )?
        .with_trailer("File", filename)?;

        self.mutate(requester, pid, Access::Edit, message, |resource, _, _| {
            let index = resource
                .files
                .iter()
                .position(|f| f.name == filename)
                .ok_or_else(|| ResourceError::FileNotFound(filename.to_string()))?;
            Ok(resource.files.remove(index).name)
        })
    }

    /// Removes a record directory and everything in it.
    ///
    /// Requires ownership; a published record can only be deleted by the system.
    pub fn delete_resource(&self, requester: &Requester, pid: &str) -> ResourceResult<ShortKey> {
        let accounts = self.accounts()?;
        CommitAuthor::for_requester(requester, &accounts)?;
        let loaded = self.load(pid)?;
        authorize(&loaded.resource, requester, &accounts, Access::Owner)?;
        if loaded.resource.published_and_frozen && !requester.is_system() {
            return Err(ResourceError::NotAuthorized(
                "published resources can only be deleted by the system".into(),
            ));
        }

        fs::remove_dir_all(&loaded.dir).map_err(ResourceError::FileDelete)?;
        prune_empty_shards(&loaded.dir, &self.cfg.resources_dir());

        tracing::info!(short_key = %loaded.key, requester = %requester, "resource deleted");
        Ok(loaded.key)
    }

    /// Publishes a resource: freezes it, clears the edit lists and mints a DOI.
    ///
    /// Publishing an already published resource returns it unchanged.
    pub fn publish_resource(&self, requester: &Requester, pid: &str) -> ResourceResult<Resource> {
        let accounts = self.accounts()?;
        let author = CommitAuthor::for_requester(requester, &accounts)?;
        let loaded = self.load(pid)?;
        authorize(&loaded.resource, requester, &accounts, Access::Owner)?;

        if loaded.resource.published_and_frozen {
            return Ok(loaded.resource);
        }

        let doi = format!("{}/hs.{}", self.cfg.doi_prefix(), loaded.key);
        let mut next = loaded.resource.clone();
        next.edit_users.clear();
        next.edit_groups.clear();
        next.frozen = true;
        next.published_and_frozen = true;
        next.doi = Some(doi.clone());
        next.touch(Utc::now());
        let stale = take_current_bag(&mut next);

        let message = HsrCommitMessage::new(
            HsrCommitDomain::Publication,
            HsrCommitAction::Publish,
            "Resource published",
        )?
        .with_trailer("DOI", doi.as_str())?;
        commit_record(&loaded.dir, &author, &message, &next, Some(&loaded.raw))?;
        if let Some(stale) = stale {
            remove_bag_archive(&loaded.dir, &stale);
        }

        tracing::info!(short_key = %loaded.key, %doi, "resource published");
        Ok(next)
    }

    fn mutate<T>(
        &self,
        requester: &Requester,
        pid: &str,
        access: Access,
        message: HsrCommitMessage,
        apply: impl FnOnce(&mut Resource, &mut BlobWriter<'_>, &AccountRegistry) -> ResourceResult<T>,
    ) -> ResourceResult<Outcome<T>> {
        let accounts = self.accounts()?;
        let author = CommitAuthor::for_requester(requester, &accounts)?;
        let loaded = self.load(pid)?;
        authorize(&loaded.resource, requester, &accounts, access)?;

        if loaded.resource.published_and_frozen {
            return self.mutate_published(loaded, &author, &accounts, message, apply);
        }

        let now = Utc::now();
        let files = self.files(&loaded.key)?;
        let mut writer = BlobWriter::new(&files, now);
        let mut next = loaded.resource.clone();

        let value = match apply(&mut next, &mut writer, &accounts) {
            Ok(value) => value,
            Err(e) => {
                writer.discard(&loaded.resource);
                return Err(e);
            }
        };
        next.touch(now);
        let stale = take_current_bag(&mut next);

        if let Err(e) = commit_record(&loaded.dir, &author, &message, &next, Some(&loaded.raw)) {
            writer.discard(&loaded.resource);
            return Err(e);
        }
        if let Some(stale) = stale {
            remove_bag_archive(&loaded.dir, &stale);
        }
        writer.finish(&loaded.resource, &next);

        Ok(Outcome {
            short_key: loaded.key,
            new_version: false,
            value,
        })
    }

    fn mutate_published<T>(
        &self,
        loaded: LoadedRecord,
        author: &CommitAuthor,
        accounts: &AccountRegistry,
        message: HsrCommitMessage,
        apply: impl FnOnce(&mut Resource, &mut BlobWriter<'_>, &AccountRegistry) -> ResourceResult<T>,
    ) -> ResourceResult<Outcome<T>> {
        if let Some(newer) = &loaded.resource.obsoleted_by {
            return Err(ResourceError::AlreadyObsoleted(format!(
                "{} (by {})",
                loaded.key, newer
            )));
        }

        let now = Utc::now();
        let (new_key, new_dir) = create_unique_shared_dir(&self.cfg.resources_dir(), ShortKey::new)?;

        let result: ResourceResult<T> = (|| {
            let old_files = self.files(&loaded.key)?;
            let new_files = self.files(&new_key)?;
            for file in &loaded.resource.files {
                new_files.add(&old_files.storage_path(&file.hash))?;
            }

            let mut next = loaded.resource.new_version(new_key.clone(), now);
            let mut writer = BlobWriter::new(&new_files, now);
            let value = apply(&mut next, &mut writer, accounts)?;
            next.touch(now);
            writer.finish(&loaded.resource, &next);

            let raw = serde_yaml::to_string(&next).map_err(ResourceError::YamlSerialization)?;
            let message = message.with_trailer("Obsoletes", loaded.key.to_string())?;
            let files = [
                FileToWrite {
                    relative_path: Path::new(".gitignore"),
                    content: DEFAULT_GITIGNORE,
                    old_content: None,
                },
                FileToWrite {
                    relative_path: Path::new(RESOURCE_YAML_FILENAME),
                    content: &raw,
                    old_content: None,
                },
            ];
            VersionedFileService::init_and_commit(&new_dir, author, &message, &files)?;

            let mut old = loaded.resource.clone();
            old.obsoleted_by = Some(new_key.clone());
            old.date_sys_metadata_modified = now;
            let obsolete = HsrCommitMessage::new(
                HsrCommitDomain::Publication,
                HsrCommitAction::Obsolete,
                format!("Obsoleted by {}", new_key),
            )?;
            commit_record(&loaded.dir, author, &obsolete, &old, Some(&loaded.raw))?;
            Ok(value)
        })();

        match result {
            Ok(value) => {
                tracing::info!(
                    obsoletes = %loaded.key,
                    short_key = %new_key,
                    "published resource versioned"
                );
                Ok(Outcome {
                    short_key: new_key,
                    new_version: true,
                    value,
                })
            }
            Err(e) => {
                if new_dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&new_dir) {
                        tracing::warn!(path = %new_dir.display(), error = %cleanup, "failed to remove abandoned version");
                    }
                }
                prune_empty_shards(&new_dir, &self.cfg.resources_dir());
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Storage helpers
    // ------------------------------------------------------------------

    fn files(&self, key: &ShortKey) -> ResourceResult<FilesService> {
        Ok(FilesService::new(&self.cfg.resources_dir(), key.clone())?)
    }

    fn load(&self, pid: &str) -> ResourceResult<LoadedRecord> {
        self.load_key(parse_pid(pid)?)
    }

    fn load_key(&self, key: ShortKey) -> ResourceResult<LoadedRecord> {
        let dir = key.sharded_dir(&self.cfg.resources_dir());
        let raw = match fs::read_to_string(dir.join(RESOURCE_YAML_FILENAME)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ResourceError::NotFound(key.to_string()))
            }
            Err(e) => return Err(ResourceError::FileRead(e)),
        };
        let resource: Resource =
            serde_yaml::from_str(&raw).map_err(ResourceError::YamlDeserialization)?;
        Ok(LoadedRecord {
            key,
            dir,
            resource,
            raw,
        })
    }
}

fn parse_pid(pid: &str) -> ResourceResult<ShortKey> {
    ShortKey::parse(pid.trim()).map_err(|_| {
        ResourceError::InvalidInput(format!("'{}' is not a valid resource id", pid.trim()))
    })
}

fn commit_record(
    dir: &Path,
    author: &CommitAuthor,
    message: &HsrCommitMessage,
    resource: &Resource,
    old_raw: Option<&str>,
) -> ResourceResult<String> {
    let raw = serde_yaml::to_string(resource).map_err(ResourceError::YamlSerialization)?;
    let files = [FileToWrite {
        relative_path: Path::new(RESOURCE_YAML_FILENAME),
        content: &raw,
        old_content: old_raw,
    }];
    VersionedFileService::write_and_commit_files(dir, author, message, &files)?;
    Ok(raw)
}

fn authorize(
    resource: &Resource,
    requester: &Requester,
    accounts: &AccountRegistry,
    access: Access,
) -> ResourceResult<()> {
    let Requester::User(name) = requester else {
        return Ok(());
    };
    let allowed = match access {
        Access::Owner => resource.is_owner(name),
        Access::Edit => resource.can_edit(name, &accounts.groups_of(name)),
    };
    if allowed {
        Ok(())
    } else {
        let needed = match access {
            Access::Owner => "owner",
            Access::Edit => "edit",
        };
        Err(ResourceError::NotAuthorized(format!(
            "{} does not have {} access to {}",
            name, needed, resource.short_key
        )))
    }
}

fn resolve_owner(
    requester: &Requester,
    owner: Option<&str>,
    accounts: &AccountRegistry,
) -> ResourceResult<String> {
    match requester {
        Requester::User(name) => {
            if let Some(id) = owner {
                if resolve_user(accounts, id)? != *name {
                    return Err(ResourceError::NotAuthorized(
                        "a user can only create resources they own".into(),
                    ));
                }
            }
            Ok(name.clone())
        }
        Requester::System => {
            let id = owner.ok_or_else(|| ResourceError::InvalidInput("an owner is required".into()))?;
            resolve_user(accounts, id)
        }
    }
}

fn resolve_user(accounts: &AccountRegistry, id: &str) -> ResourceResult<String> {
    Ok(accounts.user_from_id(id)?.username.as_str().to_string())
}

fn resolve_users(accounts: &AccountRegistry, ids: &[String]) -> ResourceResult<Vec<String>> {
    let mut names: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let name = resolve_user(accounts, id)?;
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

fn resolve_groups(accounts: &AccountRegistry, ids: &[String]) -> ResourceResult<Vec<String>> {
    let mut names: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let name = accounts.group_from_id(id)?.name.as_str().to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

fn validate_dublin(elements: Vec<DublinCoreElement>) -> ResourceResult<Vec<DublinCoreElement>> {
    elements
        .into_iter()
        .map(|e| DublinCoreElement::new(e.term, e.qualifier, e.content))
        .collect()
}

/// Rejects invalid names and names already taken by `existing` or earlier in `names`.
fn check_new_names<'a>(
    existing: &'a [ResourceFile],
    names: impl IntoIterator<Item = &'a str>,
) -> ResourceResult<()> {
    let mut taken: Vec<&str> = existing.iter().map(|f| f.name.as_str()).collect();
    for name in names {
        validate_file_name(name)?;
        if taken.contains(&name) {
            return Err(ResourceError::DuplicateFile(name.to_string()));
        }
        taken.push(name);
    }
    Ok(())
}

/// Removes the bag record for the record's current version, if any. A mutation within the
/// same second as an earlier bag would otherwise be masked by it.
fn take_current_bag(resource: &mut Resource) -> Option<BagRecord> {
    let version = resource.current_version();
    let index = resource.bags.iter().position(|b| b.version == version)?;
    Some(resource.bags.remove(index))
}

fn remove_bag_archive(dir: &Path, record: &BagRecord) {
    match fs::remove_file(dir.join(&record.filename)) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(file = %record.filename, error = %e, "failed to remove stale bag"),
    }
}

fn bag_author(resource: &Resource, accounts: &AccountRegistry) -> BagAuthor {
    match accounts.user_from_id(&resource.creator) {
        Ok(user) => BagAuthor {
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
        },
        Err(_) => BagAuthor {
            username: resource.creator.clone(),
            email: SYSTEM_COMMIT_EMAIL.to_string(),
        },
    }
}

/// Removes now-empty shard directories between a deleted record and the resources root.
fn prune_empty_shards(record_dir: &Path, resources_dir: &Path) {
    let mut current = record_dir.parent();
    while let Some(dir) = current {
        if dir == resources_dir || !dir.starts_with(resources_dir) {
            break;
        }
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resource_types_from_env_value;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        service: ResourceService,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let cfg = CoreConfig::new(
            temp.path().join("data"),
            temp.path().join("staging"),
            resource_types_from_env_value(Some(
                "GenericResource,ModelProgram:run|validate".into(),
            ))
            .unwrap(),
            "R1 development".into(),
            "10.5072".into(),
        )
        .unwrap();
        let service = ResourceService::new(Arc::new(cfg));

        let mut accounts = service.accounts().unwrap();
        accounts
            .add_user("alice", "alice@example.org", Some("Alice Liddell"))
            .unwrap();
        accounts.add_user("bob", "bob@example.org", None).unwrap();
        accounts.add_user("carol", "carol@example.org", None).unwrap();
        accounts.add_group("hydro").unwrap();
        accounts.add_group("viewers").unwrap();
        accounts.add_group_member("hydro", "bob").unwrap();

        Fixture {
            _temp: temp,
            service,
        }
    }

    fn alice() -> Requester {
        Requester::user("alice")
    }

    fn csv(name: &str, body: &str) -> UploadedFile {
        UploadedFile::new(name, body.as_bytes().to_vec())
    }

    fn create(service: &ResourceService) -> Resource {
        let mut new = NewResource::new("GenericResource", "Logan River flow");
        new.keywords = vec!["flow".into(), " Utah ".into(), "flow".into()];
        new.dublin_metadata = vec![DublinCoreElement {
            term: "Coverage".into(),
            qualifier: None,
            content: "Cache Valley".into(),
        }];
        new.files = vec![csv("flow.csv", "date,cfs\n2024-01-01,12\n")];
        service.create_resource(&alice(), new).unwrap()
    }

    fn pid(resource: &Resource) -> String {
        resource.short_key.to_string()
    }

    #[test]
    fn create_and_read_metadata() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        let sci = f.service.get_science_metadata(&pid).unwrap();
        assert_eq!(sci.title, "Logan River flow");
        assert_eq!(sci.keywords, ["flow", "Utah"]);
        assert_eq!(sci.dublin_metadata[0].term, "coverage");

        let sys = f.service.get_system_metadata(&pid).unwrap();
        assert_eq!(sys.owners, ["alice"]);
        assert_eq!(sys.checksum_algorithm, "MD5");
        assert!(!sys.published_and_frozen);

        let map = f.service.get_resource_map(&pid).unwrap();
        assert_eq!(map.aggregates.len(), 1);
        assert_eq!(map.aggregates[0].uri, format!("/resource/{}/files/flow.csv", pid));

        let content = f.service.get_resource_file(&pid, "flow.csv").unwrap();
        assert_eq!(content.bytes, b"date,cfs\n2024-01-01,12\n");
        assert_eq!(content.file.media_type.as_deref(), Some("text/csv"));

        let history = f.service.history(&pid).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].message.contains("Resource-Type: GenericResource"));
        assert_eq!(history[0].author_name, "Alice Liddell");
    }

    #[test]
    fn create_validates_input() {
        let f = fixture();

        let err = f
            .service
            .create_resource(&alice(), NewResource::new("Unknown", "x"))
            .unwrap_err();
        assert!(matches!(err, ResourceError::UnknownResourceType(_)));

        let mut new = NewResource::new("GenericResource", "x");
        new.owner = Some("bob".into());
        assert!(matches!(
            f.service.create_resource(&alice(), new),
            Err(ResourceError::NotAuthorized(_))
        ));

        assert!(matches!(
            f.service
                .create_resource(&Requester::System, NewResource::new("GenericResource", "x")),
            Err(ResourceError::InvalidInput(_))
        ));

        let mut new = NewResource::new("GenericResource", "x");
        new.view_users = vec!["nobody".into()];
        assert!(matches!(
            f.service.create_resource(&alice(), new),
            Err(ResourceError::UserNotFound(_))
        ));

        let mut new = NewResource::new("GenericResource", "x");
        new.edit_groups = vec!["nogroup".into()];
        assert!(matches!(
            f.service.create_resource(&alice(), new),
            Err(ResourceError::GroupNotFound(_))
        ));

        let mut new = NewResource::new("GenericResource", "x");
        new.files = vec![csv("a.csv", "1"), csv("a.csv", "2")];
        assert!(matches!(
            f.service.create_resource(&alice(), new),
            Err(ResourceError::DuplicateFile(_))
        ));

        assert!(matches!(
            f.service
                .create_resource(&Requester::user("mallory"), NewResource::new("GenericResource", "x")),
            Err(ResourceError::Unauthenticated)
        ));

        assert!(f.service.list_resources().unwrap().is_empty());
    }

    #[test]
    fn system_creates_on_behalf_of_owner() {
        let f = fixture();
        let mut new = NewResource::new("ModelProgram", "Model");
        new.owner = Some("bob@example.org".into());
        new.edit_users = vec!["carol".into()];
        let created = f.service.create_resource(&Requester::System, new).unwrap();

        assert_eq!(created.owners, ["bob"]);
        assert!(created.view_users.contains(&"carol".to_string()));
        assert_eq!(
            f.service.get_capabilities(&pid(&created)).unwrap(),
            ["run", "validate"]
        );
    }

    #[test]
    fn unknown_and_malformed_ids() {
        let f = fixture();
        assert!(matches!(
            f.service.get_science_metadata("not-a-key"),
            Err(ResourceError::InvalidInput(_))
        ));
        assert!(matches!(
            f.service.get_science_metadata(&ShortKey::new().to_string()),
            Err(ResourceError::NotFound(_))
        ));
    }

    #[test]
    fn file_lifecycle_and_blob_release() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        let added = f
            .service
            .add_resource_files(&alice(), &pid, vec![csv("temp.csv", "t\n1\n")])
            .unwrap();
        assert!(!added.new_version);
        assert_eq!(added.value[0].name, "temp.csv");

        assert!(matches!(
            f.service
                .add_resource_files(&alice(), &pid, vec![csv("temp.csv", "again")]),
            Err(ResourceError::DuplicateFile(_))
        ));

        let replaced = f
            .service
            .update_resource_file(&alice(), &pid, "temp.csv", csv("ignored.csv", "t\n2\n"))
            .unwrap();
        assert_eq!(replaced.value.name, "temp.csv");
        assert_eq!(
            f.service.get_resource_file(&pid, "temp.csv").unwrap().bytes,
            b"t\n2\n"
        );

        let old_hash = added.value[0].hash.clone();
        let files = f.service.files(&created.short_key).unwrap();
        assert!(!files.contains(&old_hash));

        let deleted = f
            .service
            .delete_resource_file(&alice(), &pid, "temp.csv")
            .unwrap();
        assert_eq!(deleted.value, "temp.csv");
        assert!(!files.contains(&replaced.value.hash));
        assert!(matches!(
            f.service.get_resource_file(&pid, "temp.csv"),
            Err(ResourceError::FileNotFound(_))
        ));
        assert!(matches!(
            f.service.delete_resource_file(&alice(), &pid, "temp.csv"),
            Err(ResourceError::FileNotFound(_))
        ));
    }

    #[test]
    fn invalid_upload_leaves_record_unchanged() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        let err = f
            .service
            .add_resource_files(&alice(), &pid, vec![csv("ok.csv", "fresh"), csv("bad/name", "x")])
            .unwrap_err();
        assert!(matches!(err, ResourceError::InvalidInput(_)));
        assert_eq!(f.service.get_record(&pid).unwrap().files.len(), 1);
    }

    #[test]
    fn edit_access_is_enforced() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);
        let update = || ScienceMetadataUpdate {
            keywords: Some(vec!["changed".into()]),
            ..Default::default()
        };

        assert!(matches!(
            f.service
                .update_science_metadata(&Requester::user("carol"), &pid, update()),
            Err(ResourceError::NotAuthorized(_))
        ));

        f.service
            .update_resource(
                &alice(),
                &pid,
                ResourceUpdate {
                    edit_groups: Some(vec!["hydro".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        let out = f
            .service
            .update_science_metadata(&Requester::user("bob"), &pid, update())
            .unwrap();
        assert_eq!(out.value.keywords, ["changed"]);

        assert!(matches!(
            f.service.update_resource(
                &Requester::user("bob"),
                &pid,
                ResourceUpdate {
                    owner: Some("bob".into()),
                    ..Default::default()
                }
            ),
            Err(ResourceError::NotAuthorized(_))
        ));
    }

    #[test]
    fn update_resource_replaces_collections() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        f.service
            .update_resource(
                &alice(),
                &pid,
                ResourceUpdate {
                    edit_groups: Some(vec!["hydro".into()]),
                    ..Default::default()
                },
            )
            .unwrap();

        let out = f
            .service
            .update_resource(
                &alice(),
                &pid,
                ResourceUpdate {
                    title: Some("Renamed".into()),
                    view_groups: Some(vec!["viewers".into()]),
                    owner: Some("carol".into()),
                    files: Some(vec![csv("only.csv", "x")]),
                    ..Default::default()
                },
            )
            .unwrap();
        let resource = out.value;

        assert_eq!(resource.slug, "renamed");
        assert_eq!(resource.edit_groups, ["hydro"]);
        assert!(resource.view_groups.contains(&"viewers".to_string()));
        assert!(resource.view_groups.contains(&"hydro".to_string()));
        assert_eq!(resource.owners, ["alice", "carol"]);
        assert!(resource.edit_users.contains(&"carol".to_string()));
        assert_eq!(resource.files.len(), 1);
        assert_eq!(resource.files[0].name, "only.csv");
    }

    #[test]
    fn get_resource_creates_bag_once_per_version() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        let first = f.service.get_resource(&pid).unwrap();
        let second = f.service.get_resource(&pid).unwrap();
        assert_eq!(first.record, second.record);
        assert_eq!(f.service.get_revisions(&pid).unwrap().len(), 1);
        assert_eq!(
            f.service.get_checksum(&pid).unwrap(),
            hsr_bagit::md5_bytes(&first.bytes).to_string()
        );
        assert_eq!(
            first.file_name(),
            format!("{}_{}.zip", pid, first.record.version)
        );

        let report = f.service.verify_stored_bag(&pid).unwrap();
        assert_eq!(report.info.get("author"), Some("alice"));

        let updated_before = f.service.get_record(&pid).unwrap().updated;
        assert_eq!(updated_before, created.updated);
    }

    #[test]
    fn bag_reflects_later_changes() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        f.service.get_resource(&pid).unwrap();
        f.service
            .add_resource_files(&alice(), &pid, vec![csv("later.csv", "x")])
            .unwrap();
        let download = f.service.get_resource(&pid).unwrap();

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bag.zip");
        fs::write(&path, &download.bytes).unwrap();
        let report = packaging::verify_bag(&path).unwrap();
        assert!(report
            .manifest
            .iter()
            .any(|(p, _)| p == "data/contents/later.csv"));
    }

    #[test]
    fn corrupted_bag_is_reported() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        let download = f.service.get_resource(&pid).unwrap();
        let dir = created
            .short_key
            .sharded_dir(&f.service.config().resources_dir());
        fs::write(dir.join(&download.record.filename), b"garbage").unwrap();

        assert!(matches!(
            f.service.get_resource(&pid),
            Err(ResourceError::BagChecksumMismatch { .. })
        ));
    }

    #[test]
    fn publish_then_version_on_change() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        assert!(matches!(
            f.service.publish_resource(&Requester::user("bob"), &pid),
            Err(ResourceError::NotAuthorized(_))
        ));

        let published = f.service.publish_resource(&alice(), &pid).unwrap();
        assert!(published.published_and_frozen);
        assert!(published.frozen);
        assert!(published.edit_users.is_empty());
        let doi = format!("10.5072/hs.{}", pid);
        assert_eq!(published.doi.as_deref(), Some(doi.as_str()));
        assert_eq!(f.service.publish_resource(&alice(), &pid).unwrap(), published);
        assert_eq!(f.service.resolve_doi(&doi).unwrap(), created.short_key);
        assert_eq!(
            f.service
                .resolve_doi(&format!("https://doi.org/{}", doi))
                .unwrap(),
            created.short_key
        );

        let out = f
            .service
            .add_resource_files(&alice(), &pid, vec![csv("v2.csv", "x")])
            .unwrap();
        assert!(out.new_version);
        assert_ne!(out.short_key, created.short_key);

        let new_pid = out.short_key.to_string();
        let next = f.service.get_record(&new_pid).unwrap();
        assert_eq!(next.obsoletes, Some(created.short_key.clone()));
        assert!(!next.published_and_frozen);
        assert_eq!(next.files.len(), 2);
        assert_eq!(
            f.service.get_resource_file(&new_pid, "flow.csv").unwrap().bytes,
            b"date,cfs\n2024-01-01,12\n"
        );

        let old = f.service.get_record(&pid).unwrap();
        assert_eq!(old.obsoleted_by, Some(out.short_key.clone()));
        assert_eq!(old.files.len(), 1);
        assert!(f
            .service
            .history(&pid)
            .unwrap()
            .iter()
            .any(|c| c.summary.starts_with("publication:obsolete")));

        assert!(matches!(
            f.service.delete_resource_file(&alice(), &pid, "flow.csv"),
            Err(ResourceError::AlreadyObsoleted(_))
        ));
        assert_eq!(f.service.list_resources().unwrap().len(), 2);
    }

    #[test]
    fn delete_rules() {
        let f = fixture();
        let created = create(&f.service);
        let pid = pid(&created);

        assert!(matches!(
            f.service.delete_resource(&Requester::user("carol"), &pid),
            Err(ResourceError::NotAuthorized(_))
        ));

        f.service.publish_resource(&alice(), &pid).unwrap();
        assert!(matches!(
            f.service.delete_resource(&alice(), &pid),
            Err(ResourceError::NotAuthorized(_))
        ));

        assert_eq!(
            f.service.delete_resource(&Requester::System, &pid).unwrap(),
            created.short_key
        );
        assert!(matches!(
            f.service.get_record(&pid),
            Err(ResourceError::NotFound(_))
        ));
        assert!(!f
            .service
            .config()
            .resources_dir()
            .join(&pid[0..2])
            .exists());
    }

    #[test]
    fn abandoned_record_dir_leaves_no_empty_shards() {
        let f = fixture();
        let resources_dir = f.service.config().resources_dir();
        let keep: ShortKey = "ab120000000000000000000000000001".parse().unwrap();
        let abandon: ShortKey = "abcd0000000000000000000000000002".parse().unwrap();

        let (_, kept_dir) = create_unique_shared_dir(&resources_dir, || keep.clone()).unwrap();
        let (_, dir) = create_unique_shared_dir(&resources_dir, || abandon.clone()).unwrap();

        fs::remove_dir_all(&dir).unwrap();
        prune_empty_shards(&dir, &resources_dir);

        assert!(!resources_dir.join("ab").join("cd").exists());
        assert!(kept_dir.is_dir());

        fs::remove_dir_all(&kept_dir).unwrap();
        prune_empty_shards(&kept_dir, &resources_dir);
        assert!(!resources_dir.join("ab").exists());
        assert!(resources_dir.is_dir());
    }

    #[test]
    fn related_is_not_implemented() {
        let f = fixture();
        let created = create(&f.service);
        assert!(matches!(
            f.service.get_related(&pid(&created)),
            Err(ResourceError::NotImplemented(_))
        ));
    }
}
