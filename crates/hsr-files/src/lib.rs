//! HSR payload storage
//!
//! Stores the bytes of resource files in a content-addressed area inside each
//! resource directory. The resource record refers to stored bytes by SHA-256 hash and keeps
//! the logical file name itself; this crate knows nothing about names, access lists or
//! metadata.
//!
//! ## Layout
//!
//! ```text
//! resources/
//! └── <s1>/<s2>/<short_key>/
//!     ├── resource.yaml
//!     └── files/        # gitignored
//!         └── sha256/
//!             └── ab/
//!                 └── cd/
//!                     └── abcd3f9e…
//! ```
//!
//! Identical content is stored once per resource; two logical files with the same bytes
//! share a blob.
//!
//! ## Example Usage
//!
//! ```no_run
//! use hsr_files::FilesService;
//! use hsr_uuid::ShortKey;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = Path::new("resource_data/resources");
//! let key = ShortKey::parse("550e8400e29b41d4a716446655440000")?;
//!
//! let service = FilesService::new(root, key)?;
//! let stored = service.add_bytes(b"date,cfs\n")?;
//! let bytes = service.read(&stored.hash)?;
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{FILES_FOLDER_NAME, HASH_ALGORITHM};
pub use files::{FilesService, StoredBlob};
pub use hsr_uuid::{Sha256Hash, ShortKey};

/// Errors that can occur during payload storage operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Resource directory does not exist
    #[error("Resource directory not found: {0}")]
    ResourceNotFound(String),

    /// No blob is stored under the requested hash
    #[error("No stored content for hash {0}")]
    BlobNotFound(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Identifier or digest error from hsr-uuid
    #[error("Identifier error: {0}")]
    Uuid(#[from] hsr_uuid::UuidError),
}
