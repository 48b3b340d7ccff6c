/// Name of the per-resource folder holding payload blobs.
pub const FILES_FOLDER_NAME: &str = "files";

/// Hash algorithm used for content addressing.
pub const HASH_ALGORITHM: &str = "sha256";
