//! # HSR BagIt
//!
//! Writes [BagIt](https://datatracker.ietf.org/doc/html/rfc8493) bags (version 0.97 tag
//! files, MD5 manifests), zips them for distribution, and verifies zipped bags.
//!
//! A bag on disk looks like:
//!
//! ```text
//! <bag_dir>/
//!   bagit.txt
//!   bag-info.txt
//!   manifest-md5.txt
//!   tagmanifest-md5.txt
//!   data/
//!     ...payload...
//! ```
//!
//! [`zip_directory`] stores entries relative to the *parent* of the bag directory, so the
//! archive's single top-level folder is the bag directory's own name.
//!
//! This crate is storage-agnostic: callers stage payload through [`BagBuilder`] and decide
//! where the resulting archive lives.

mod archive;
mod builder;
mod manifest;
mod verify;

pub use archive::zip_directory;
pub use builder::{Bag, BagBuilder, BagInfo, PayloadOxum};
pub use manifest::{md5_bytes, md5_file, MANIFEST_FILENAME, TAG_MANIFEST_FILENAME};
pub use verify::{verify_zipped_bag, BagVerification};

/// BagIt version written to `bagit.txt`.
pub const BAGIT_VERSION: &str = "0.97";

/// Name of the payload directory inside a bag.
pub const PAYLOAD_DIR: &str = "data";

/// Errors raised while writing, packaging or verifying bags.
#[derive(Debug, thiserror::Error)]
pub enum BagError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Payload path is absolute, empty or escapes the payload directory.
    #[error("invalid payload path: {0}")]
    InvalidPayloadPath(String),

    /// A bag-info label contains ':' or a line break, or a value contains a line break.
    #[error("invalid bag-info field: {0}")]
    InvalidBagInfo(String),

    /// The bag directory already exists.
    #[error("bag directory already exists: {0}")]
    BagDirectoryExists(String),

    /// The archive is not a structurally valid bag.
    #[error("invalid bag: {0}")]
    InvalidBag(String),

    #[error("checksum mismatch for {path}: manifest {expected}, actual {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

pub type BagResult<T> = std::result::Result<T, BagError>;
