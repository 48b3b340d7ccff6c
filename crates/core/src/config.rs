//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as
//! `Arc<CoreConfig>`. Services never read process-wide environment variables during request
//! handling; binaries call the `*_from_env_value` helpers below with whatever they read at
//! startup.

use crate::constants::{
    ACCOUNTS_FILENAME, DEFAULT_BAG_TEMP_DIR_NAME, DEFAULT_DATA_DIR, DEFAULT_DOI_PREFIX,
    DEFAULT_RESOURCE_TYPE, DEFAULT_VERSION_LABEL, RESOURCES_DIR_NAME,
};
use crate::{ResourceError, ResourceResult};
use std::path::{Path, PathBuf};

/// A registered resource type and the extra capabilities it declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceTypeSpec {
    name: String,
    capabilities: Vec<String>,
}

impl ResourceTypeSpec {
    pub fn new(name: impl Into<String>, capabilities: Vec<String>) -> ResourceResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ResourceError::InvalidInput(format!(
                "resource type name must be a non-empty token, got: '{}'",
                name
            )));
        }

        let mut caps: Vec<String> = Vec::new();
        for cap in capabilities {
            let cap = cap.trim().to_string();
            if cap.is_empty() {
                continue;
            }
            if !caps.contains(&cap) {
                caps.push(cap);
            }
        }

        Ok(Self {
            name,
            capabilities: caps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    bag_temp_dir: PathBuf,
    resource_types: Vec<ResourceTypeSpec>,
    version_label: String,
    doi_prefix: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidInput`] if no resource type is registered, a type is
    /// registered twice, the version label is blank, or the DOI prefix is not `10.<digits>`.
    pub fn new(
        data_dir: PathBuf,
        bag_temp_dir: PathBuf,
        resource_types: Vec<ResourceTypeSpec>,
        version_label: String,
        doi_prefix: String,
    ) -> ResourceResult<Self> {
        if resource_types.is_empty() {
            return Err(ResourceError::InvalidInput(
                "at least one resource type must be registered".into(),
            ));
        }
        for (i, spec) in resource_types.iter().enumerate() {
            if resource_types[..i].iter().any(|s| s.name == spec.name) {
                return Err(ResourceError::InvalidInput(format!(
                    "resource type '{}' is registered twice",
                    spec.name
                )));
            }
        }

        let version_label = version_label.trim().to_string();
        if version_label.is_empty() || version_label.contains(['\n', '\r']) {
            return Err(ResourceError::InvalidInput(
                "version label must be a non-empty single line".into(),
            ));
        }

        let doi_prefix = doi_prefix.trim().trim_end_matches('/').to_string();
        if !is_valid_doi_prefix(&doi_prefix) {
            return Err(ResourceError::InvalidInput(format!(
                "DOI prefix must look like 10.<digits>, got: '{}'",
                doi_prefix
            )));
        }

        Ok(Self {
            data_dir,
            bag_temp_dir,
            resource_types,
            version_label,
            doi_prefix,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.data_dir.join(RESOURCES_DIR_NAME)
    }

    pub fn accounts_file(&self) -> PathBuf {
        self.data_dir.join(ACCOUNTS_FILENAME)
    }

    pub fn bag_temp_dir(&self) -> &Path {
        &self.bag_temp_dir
    }

    pub fn resource_types(&self) -> &[ResourceTypeSpec] {
        &self.resource_types
    }

    /// Looks up a registered resource type by exact name.
    pub fn resource_type(&self, name: &str) -> Option<&ResourceTypeSpec> {
        self.resource_types.iter().find(|s| s.name == name)
    }

    pub fn version_label(&self) -> &str {
        &self.version_label
    }

    pub fn doi_prefix(&self) -> &str {
        &self.doi_prefix
    }
}

fn is_valid_doi_prefix(prefix: &str) -> bool {
    match prefix.strip_prefix("10.") {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the data directory from an optional value, defaulting to `resource_data`.
pub fn data_dir_from_env_value(value: Option<String>) -> PathBuf {
    PathBuf::from(non_blank(value).unwrap_or_else(|| DEFAULT_DATA_DIR.into()))
}

/// Resolve the bag staging root, defaulting to `<system temp>/hsr-bags`.
pub fn bag_temp_dir_from_env_value(value: Option<String>) -> PathBuf {
    match non_blank(value) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::temp_dir().join(DEFAULT_BAG_TEMP_DIR_NAME),
    }
}

/// Parse the registered resource types.
///
/// The value is a comma separated list; each entry is a type name optionally followed by
/// `:` and a `|` separated capability list, e.g. `GenericResource,RasterResource:resample|tile`.
/// `None` or a blank value registers only `GenericResource`.
pub fn resource_types_from_env_value(value: Option<String>) -> ResourceResult<Vec<ResourceTypeSpec>> {
    let Some(value) = non_blank(value) else {
        return Ok(vec![ResourceTypeSpec::new(DEFAULT_RESOURCE_TYPE, vec![])?]);
    };

    let mut specs = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, caps) = match entry.split_once(':') {
            Some((name, caps)) => (
                name,
                caps.split('|').map(str::to_string).collect::<Vec<_>>(),
            ),
            None => (entry, Vec::new()),
        };
        specs.push(ResourceTypeSpec::new(name, caps)?);
    }
    Ok(specs)
}

/// Resolve the version label written into bags.
pub fn version_label_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_VERSION_LABEL.into())
}

/// Resolve the DOI prefix used on publication.
pub fn doi_prefix_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_DOI_PREFIX.into())
}
