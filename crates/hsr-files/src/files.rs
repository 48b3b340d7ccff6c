//! Resource-scoped payload storage service.
//!
//! [`FilesService`] is bound to one resource directory and stores payload bytes under
//! `files/sha256/<aa>/<bb>/<hash>` inside it.
//!
//! - Content addressing gives deduplication within a resource and lets the record verify
//!   bytes against the recorded hash.
//! - Blobs are never rewritten in place; replacing a file's bytes stores a new blob and the
//!   caller decides when the old one is no longer referenced.
//! - The root and resource directories are validated and canonicalised at construction.

use crate::{FilesError, FILES_FOLDER_NAME, HASH_ALGORITHM};
use chrono::{DateTime, Utc};
use hsr_types::NonEmptyText;
use hsr_uuid::{Sha256Hash, ShortKey};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata describing a stored blob.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredBlob {
    /// Hashing algorithm used (always "sha256")
    pub hash_algorithm: NonEmptyText,

    /// Hex digest of the content
    pub hash: Sha256Hash,

    /// Path relative to the resource directory
    pub relative_path: NonEmptyText,

    pub size_bytes: u64,

    /// Best-effort media type sniffed from the content, not authoritative.
    pub media_type: Option<NonEmptyText>,

    /// UTC time the bytes were first written
    pub stored_at: DateTime<Utc>,
}

/// Service for the payload blobs of a single resource.
#[derive(Debug)]
pub struct FilesService {
    /// Root directory containing all resource directories
    root_directory: PathBuf,

    resource_key: ShortKey,
}

impl FilesService {
    /// Creates a service bound to an existing resource directory.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - the root directory does not exist or is not a directory,
    /// - the resource directory does not exist or is not a directory,
    /// - canonicalising the root fails.
    pub fn new(root_directory: &Path, resource_key: ShortKey) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let resource_root = resource_key.sharded_dir(&root_directory);
        if !resource_root.is_dir() {
            return Err(FilesError::ResourceNotFound(format!(
                "Resource directory does not exist: {}",
                resource_root.display()
            )));
        }

        Ok(Self {
            root_directory,
            resource_key,
        })
    }

    /// Stores `bytes` and returns the blob metadata.
    ///
    /// Storing content that is already present is not an error: the existing blob is
    /// kept and its metadata returned with a fresh `stored_at`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the storage directories or the blob cannot be written.
    pub fn add_bytes(&self, bytes: &[u8]) -> Result<StoredBlob, FilesError> {
        let hash_bytes: [u8; 32] = Sha256::digest(bytes).into();
        let hash = Sha256Hash::from_bytes(&hash_bytes);
        let relative_path = Self::compute_relative_path(&hash);
        let storage_path = self.resource_root().join(relative_path.as_str());

        if storage_path.exists() {
            tracing::debug!("blob {} already stored, reusing", hash);
        } else {
            if let Some(parent) = storage_path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create storage directory {}: {}",
                            parent.display(),
                            e
                        ),
                    ))
                })?;
            }

            // Write to a sibling temp name first so a partially written blob never
            // appears under its content hash.
            let partial = storage_path.with_extension("partial");
            fs::write(&partial, bytes).map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write file to {}: {}", partial.display(), e),
                ))
            })?;
            fs::rename(&partial, &storage_path)?;
        }

        let media_type = infer::get(bytes).and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        Ok(StoredBlob {
            hash_algorithm: NonEmptyText::new(HASH_ALGORITHM).expect("sha256 is non-empty"),
            hash,
            relative_path,
            size_bytes: bytes.len() as u64,
            media_type,
            stored_at: Utc::now(),
        })
    }

    /// Reads a file from disk and stores its bytes.
    pub fn add(&self, source_path: &Path) -> Result<StoredBlob, FilesError> {
        let buffer = fs::read(source_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read source file {}: {}",
                    source_path.display(),
                    e
                ),
            ))
        })?;
        self.add_bytes(&buffer)
    }

    /// Returns the bytes stored under `hash`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::BlobNotFound` if nothing is stored under the hash, or
    /// `FilesError::Io` if reading fails.
    pub fn read(&self, hash: &Sha256Hash) -> Result<Vec<u8>, FilesError> {
        let storage_path = self.storage_path(hash);
        if !storage_path.is_file() {
            return Err(FilesError::BlobNotFound(hash.to_string()));
        }
        fs::read(&storage_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read file from {}: {}", storage_path.display(), e),
            ))
        })
    }

    /// Returns true if a blob exists for `hash`.
    pub fn contains(&self, hash: &Sha256Hash) -> bool {
        self.storage_path(hash).is_file()
    }

    /// Removes the blob stored under `hash`.
    ///
    /// Callers must only do this once no file in the record references the hash.
    pub fn remove(&self, hash: &Sha256Hash) -> Result<(), FilesError> {
        let storage_path = self.storage_path(hash);
        if !storage_path.is_file() {
            return Err(FilesError::BlobNotFound(hash.to_string()));
        }
        fs::remove_file(&storage_path)?;
        Ok(())
    }

    /// Absolute path where the blob for `hash` lives (it may not exist).
    pub fn storage_path(&self, hash: &Sha256Hash) -> PathBuf {
        self.resource_root()
            .join(Self::compute_relative_path(hash).as_str())
    }

    /// `files/sha256/<shard1>/<shard2>/<hash>`
    fn compute_relative_path(hash: &Sha256Hash) -> NonEmptyText {
        let hex = hash.as_str();
        let shard1 = &hex[0..2];
        let shard2 = &hex[2..4];
        NonEmptyText::new(format!(
            "{}/{}/{}/{}/{}",
            FILES_FOLDER_NAME, HASH_ALGORITHM, shard1, shard2, hex
        ))
        .expect("computed path is non-empty")
    }

    #[must_use]
    pub fn resource_key(&self) -> &ShortKey {
        &self.resource_key
    }

    #[must_use]
    fn resource_root(&self) -> PathBuf {
        self.resource_key.sharded_dir(&self.root_directory)
    }

    /// Path to the `files/` directory of this resource (may not exist yet).
    #[must_use]
    pub fn files_directory(&self) -> PathBuf {
        self.resource_root().join(FILES_FOLDER_NAME)
    }
}
