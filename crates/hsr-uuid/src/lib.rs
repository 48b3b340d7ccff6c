//! Resource identifiers, digests and sharded-path utilities.
//!
//! Every resource is identified by a *short key*: a UUID rendered in canonical form,
//! **32 lowercase hexadecimal characters** (no hyphens). The short key doubles as the
//! resource pid in the REST surface and as the leaf of its storage directory.
//!
//! ## Sharded directory layout
//! For a canonical key `k`, resource data lives under:
//! `parent_dir/<k[0..2]>/<k[2..4]>/<k>/`
//!
//! Example:
//! `resource_data/resources/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! Sharding keeps the fan-out of any single directory bounded.
//!
//! The crate also provides validated hex digest wrappers ([`Sha256Hash`], [`Md5Hash`])
//! used for content addressing and bag checksums, and [`BagVersion`], the timestamp label
//! given to each generated bag.

mod digest;
mod service;

pub use digest::{Md5Hash, Sha256Hash};
pub use service::{BagVersion, ShortKey, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
