//! Constants used throughout the HSR core crate.
//!
//! Path and filename constants live here so storage layout stays consistent across
//! services.

/// Default directory for repository data when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "resource_data";

/// Directory under the data directory holding sharded resource records.
pub const RESOURCES_DIR_NAME: &str = "resources";

/// File under the data directory holding users and groups.
pub const ACCOUNTS_FILENAME: &str = "accounts.yaml";

/// Per-resource record file.
pub const RESOURCE_YAML_FILENAME: &str = "resource.yaml";

/// Per-resource directory holding generated bag archives.
pub const BAGS_DIR_NAME: &str = "bags";

/// Folder name under the system temp dir used for bag staging by default.
pub const DEFAULT_BAG_TEMP_DIR_NAME: &str = "hsr-bags";

/// Resource type registered when none is configured.
pub const DEFAULT_RESOURCE_TYPE: &str = "GenericResource";

/// Label written to bag-info.txt as `hydroshare_version` by default.
pub const DEFAULT_VERSION_LABEL: &str = "R1 development";

/// DOI prefix used on publication by default (DataCite test prefix).
pub const DEFAULT_DOI_PREFIX: &str = "10.5072";

/// Name of the serialized resource document inside a bag payload.
pub const RESOURCE_METADATA_JSON: &str = "resourcemetadata.json";

/// Payload folder for resource files inside a bag.
pub const BAG_CONTENTS_DIR: &str = "contents";

/// Payload folder reserved for visualizations inside a bag.
pub const BAG_VISUALIZATION_DIR: &str = "visualization";

/// Content type used when an upload does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// `.gitignore` written into every resource directory. Payload blobs and bags are not
/// tracked; only the record is.
pub const DEFAULT_GITIGNORE: &str = "files/\nbags/\n";

/// Name and email used for commits made on behalf of the system.
pub const SYSTEM_COMMIT_NAME: &str = "HSR System";
pub const SYSTEM_COMMIT_EMAIL: &str = "system@hsr.invalid";
