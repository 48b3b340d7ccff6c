//! # HSR Core
//!
//! Core business logic for the HSR resource repository.
//!
//! This crate contains pure data operations and file/folder management:
//! - Resource creation, update, publication and deletion with sharded YAML storage
//! - Payload files stored as content-addressed blobs per resource
//! - BagIt packaging of resource versions
//! - Git history of every record change
//! - Users and groups used by the access lists
//!
//! **No API concerns**: authentication, HTTP servers, or service interfaces belong in
//! `api-rest` or `api-shared`. Callers state who is acting through [`Requester`]; this crate
//! only checks what that party may do.

pub mod accounts;
pub mod author;
pub mod config;
pub mod constants;
mod error;
pub mod model;
pub mod packaging;
pub mod repositories;
pub mod slug;
pub mod upload;
pub(crate) mod versioned_files;

pub use accounts::{AccountRegistry, Group, User};
pub use author::{CommitAuthor, Requester};
pub use config::{CoreConfig, ResourceTypeSpec};
pub use error::{ResourceError, ResourceResult};
pub use model::{
    BagRecord, DublinCoreElement, Resource, ResourceFile, ResourceMap, ResourceSummary,
    ScienceMetadata, SystemMetadata,
};
pub use repositories::resources::{
    BagDownload, FileContent, NewResource, Outcome, ResourceService, ResourceUpdate,
    ScienceMetadataUpdate,
};
pub use upload::{Base64File, UploadedFile};
pub use versioned_files::CommitInfo;

pub use hsr_bagit::BagVerification;
pub use hsr_uuid::{BagVersion, Md5Hash, Sha256Hash, ShortKey};
