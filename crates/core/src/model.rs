//! Resource records and the metadata views derived from them.
//!
//! A [`Resource`] is persisted as `resource.yaml` in the resource directory. The view types
//! ([`ScienceMetadata`], [`SystemMetadata`], [`ResourceMap`], [`ResourceSummary`]) are
//! read-only projections built on demand.

use crate::slug::slugify;
use crate::{ResourceError, ResourceResult};
use chrono::{DateTime, Utc};
use hsr_uuid::{BagVersion, Md5Hash, Sha256Hash, ShortKey};
use serde::{Deserialize, Serialize};

/// The fifteen elements of the Dublin Core Metadata Element Set.
pub const DUBLIN_CORE_TERMS: [&str; 15] = [
    "contributor",
    "coverage",
    "creator",
    "date",
    "description",
    "format",
    "identifier",
    "language",
    "publisher",
    "relation",
    "rights",
    "source",
    "subject",
    "title",
    "type",
];

/// A qualified Dublin Core element attached to a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DublinCoreElement {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    pub content: String,
}

impl DublinCoreElement {
    /// Validates and normalises an element.
    ///
    /// The term is matched case-insensitively and stored lowercase. A blank qualifier is
    /// dropped.
    pub fn new(
        term: impl AsRef<str>,
        qualifier: Option<String>,
        content: impl Into<String>,
    ) -> ResourceResult<Self> {
        let term = term.as_ref().trim().to_ascii_lowercase();
        if !DUBLIN_CORE_TERMS.contains(&term.as_str()) {
            return Err(ResourceError::InvalidInput(format!(
                "'{}' is not a Dublin Core element",
                term
            )));
        }

        let content = content.into().trim().to_string();
        if content.is_empty() {
            return Err(ResourceError::InvalidInput(format!(
                "Dublin Core element '{}' must have content",
                term
            )));
        }

        let qualifier = qualifier
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        Ok(Self {
            term,
            qualifier,
            content,
        })
    }
}

/// A logical file in a resource, pointing at a stored blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    pub name: String,
    pub hash: Sha256Hash,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub stored_at: DateTime<Utc>,
}

/// A generated bag archive attached to a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagRecord {
    pub version: BagVersion,
    pub timestamp: DateTime<Utc>,
    /// Path of the archive relative to the resource directory.
    pub filename: String,
    pub md5: Md5Hash,
    pub size_bytes: u64,
}

/// The persisted resource record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub short_key: ShortKey,
    pub resource_type: String,
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub creator: String,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub edit_users: Vec<String>,
    #[serde(default)]
    pub view_users: Vec<String>,
    #[serde(default)]
    pub edit_groups: Vec<String>,
    #[serde(default)]
    pub view_groups: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub dublin_metadata: Vec<DublinCoreElement>,
    #[serde(default)]
    pub files: Vec<ResourceFile>,
    #[serde(default)]
    pub bags: Vec<BagRecord>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub date_sys_metadata_modified: DateTime<Utc>,
    #[serde(default)]
    pub published_and_frozen: bool,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obsoletes: Option<ShortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obsoleted_by: Option<ShortKey>,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Validates a resource title: non-empty and single-line. Returns it trimmed.
pub fn validate_title(title: &str) -> ResourceResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ResourceError::InvalidInput("title must not be empty".into()));
    }
    if title.chars().any(char::is_control) {
        return Err(ResourceError::InvalidInput(
            "title must be a single line without control characters".into(),
        ));
    }
    Ok(title.to_string())
}

/// Validates a logical file name: a single, non-empty path component.
pub fn validate_file_name(name: &str) -> ResourceResult<()> {
    let invalid = |reason: &str| {
        Err(ResourceError::InvalidInput(format!(
            "invalid file name '{}': {}",
            name.escape_debug(),
            reason
        )))
    };

    if name.trim().is_empty() {
        return invalid("empty");
    }
    if name != name.trim() {
        return invalid("leading or trailing whitespace");
    }
    if name == "." || name == ".." {
        return invalid("reserved name");
    }
    if name.contains(['/', '\\']) {
        return invalid("must not contain path separators");
    }
    if name.chars().any(char::is_control) {
        return invalid("must not contain control characters");
    }
    Ok(())
}

/// Trims keywords, drops blanks and duplicates, and keeps first-seen order.
pub fn normalise_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for keyword in keywords {
        let keyword = keyword.as_ref().trim();
        if !keyword.is_empty() {
            push_unique(&mut out, keyword);
        }
    }
    out
}

impl Resource {
    /// Builds a fresh record whose creator is its first owner, editor and viewer.
    pub fn new(
        short_key: ShortKey,
        resource_type: impl Into<String>,
        title: &str,
        creator: &str,
        now: DateTime<Utc>,
    ) -> ResourceResult<Self> {
        let title = validate_title(title)?;
        let slug = slugify(&title);
        let creator = creator.to_string();

        Ok(Self {
            short_key,
            resource_type: resource_type.into(),
            title,
            slug,
            description: None,
            owners: vec![creator.clone()],
            edit_users: vec![creator.clone()],
            view_users: vec![creator.clone()],
            creator,
            edit_groups: Vec::new(),
            view_groups: Vec::new(),
            keywords: Vec::new(),
            dublin_metadata: Vec::new(),
            files: Vec::new(),
            bags: Vec::new(),
            created: now,
            updated: now,
            date_sys_metadata_modified: now,
            published_and_frozen: false,
            frozen: false,
            doi: None,
            obsoletes: None,
            obsoleted_by: None,
        })
    }

    /// Sets a new title and re-derives the slug.
    pub fn set_title(&mut self, title: &str) -> ResourceResult<()> {
        self.title = validate_title(title)?;
        self.slug = slugify(&self.title);
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    pub fn set_keywords<I, S>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = normalise_keywords(keywords);
    }

    /// Adds an owner, who also gains edit and view access.
    pub fn add_owner(&mut self, username: &str) {
        push_unique(&mut self.owners, username);
        self.add_edit_user(username);
    }

    /// Adds an editor, who also gains view access.
    pub fn add_edit_user(&mut self, username: &str) {
        push_unique(&mut self.edit_users, username);
        push_unique(&mut self.view_users, username);
    }

    pub fn add_view_user(&mut self, username: &str) {
        push_unique(&mut self.view_users, username);
    }

    /// Adds an edit group, which also gains view access.
    pub fn add_edit_group(&mut self, group: &str) {
        push_unique(&mut self.edit_groups, group);
        push_unique(&mut self.view_groups, group);
    }

    pub fn add_view_group(&mut self, group: &str) {
        push_unique(&mut self.view_groups, group);
    }

    /// Re-applies the access invariants after an access list was replaced: owners can edit,
    /// and everyone who can edit can view.
    ///
    /// Published resources are left alone; publication deliberately empties the edit lists.
    pub fn restore_access_invariants(&mut self) {
        if self.published_and_frozen {
            return;
        }
        for owner in self.owners.clone() {
            push_unique(&mut self.edit_users, &owner);
        }
        for user in self.edit_users.clone() {
            push_unique(&mut self.view_users, &user);
        }
        for group in self.edit_groups.clone() {
            push_unique(&mut self.view_groups, &group);
        }
    }

    pub fn is_owner(&self, username: &str) -> bool {
        self.owners.iter().any(|o| o == username)
    }

    /// True if `username` may edit, directly or through one of `groups`.
    pub fn can_edit(&self, username: &str, groups: &[String]) -> bool {
        self.is_owner(username)
            || self.edit_users.iter().any(|u| u == username)
            || self.edit_groups.iter().any(|g| groups.contains(g))
    }

    pub fn file(&self, name: &str) -> Option<&ResourceFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// True if any logical file still points at `hash`.
    pub fn references_blob(&self, hash: &Sha256Hash) -> bool {
        self.files.iter().any(|f| &f.hash == hash)
    }

    /// The bag version label for the current state of the record.
    pub fn current_version(&self) -> BagVersion {
        BagVersion::from_timestamp(self.updated)
    }

    pub fn bag(&self, version: &BagVersion) -> Option<&BagRecord> {
        self.bags.iter().find(|b| &b.version == version)
    }

    /// Records a metadata change at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = now;
        self.date_sys_metadata_modified = now;
    }

    /// Starts a new, unpublished version of this (published) record under `short_key`.
    ///
    /// The copy keeps metadata, access lists and file records, links back through
    /// `obsoletes`, and starts with no bags.
    pub fn new_version(&self, short_key: ShortKey, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.short_key = short_key;
        next.bags.clear();
        next.created = now;
        next.updated = now;
        next.date_sys_metadata_modified = now;
        next.published_and_frozen = false;
        next.frozen = false;
        next.doi = None;
        next.obsoletes = Some(self.short_key.clone());
        next.obsoleted_by = None;
        next.restore_access_invariants();
        next
    }

    pub fn science_metadata(&self) -> ScienceMetadata {
        ScienceMetadata {
            short_key: self.short_key.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            keywords: self.keywords.clone(),
            dublin_metadata: self.dublin_metadata.clone(),
        }
    }

    pub fn system_metadata(&self) -> SystemMetadata {
        SystemMetadata {
            short_key: self.short_key.clone(),
            resource_type: self.resource_type.clone(),
            slug: self.slug.clone(),
            creator: self.creator.clone(),
            owners: self.owners.clone(),
            edit_users: self.edit_users.clone(),
            view_users: self.view_users.clone(),
            edit_groups: self.edit_groups.clone(),
            view_groups: self.view_groups.clone(),
            created: self.created,
            updated: self.updated,
            date_sys_metadata_modified: self.date_sys_metadata_modified,
            published_and_frozen: self.published_and_frozen,
            frozen: self.frozen,
            doi: self.doi.clone(),
            obsoletes: self.obsoletes.clone(),
            obsoleted_by: self.obsoleted_by.clone(),
            checksum_algorithm: "MD5".to_string(),
            bags: self.bags.clone(),
        }
    }

    pub fn resource_map(&self) -> ResourceMap {
        let key = self.short_key.to_string();
        ResourceMap {
            short_key: self.short_key.clone(),
            title: self.title.clone(),
            created: self.created,
            updated: self.updated,
            aggregates: self
                .files
                .iter()
                .map(|f| ResourceMapEntry {
                    uri: format!("/resource/{}/files/{}", key, f.name),
                    name: f.name.clone(),
                    size_bytes: f.size_bytes,
                    media_type: f.media_type.clone(),
                    sha256: f.hash.clone(),
                })
                .collect(),
            documented_by: vec![format!("/scimeta/{}", key), format!("/sysmeta/{}", key)],
        }
    }

    pub fn summary(&self) -> ResourceSummary {
        ResourceSummary {
            short_key: self.short_key.clone(),
            title: self.title.clone(),
            resource_type: self.resource_type.clone(),
            creator: self.creator.clone(),
            updated: self.updated,
            published_and_frozen: self.published_and_frozen,
            obsoleted_by: self.obsoleted_by.clone(),
        }
    }
}

/// Descriptive metadata of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScienceMetadata {
    pub short_key: ShortKey,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub dublin_metadata: Vec<DublinCoreElement>,
}

/// Administrative metadata of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMetadata {
    pub short_key: ShortKey,
    pub resource_type: String,
    pub slug: String,
    pub creator: String,
    pub owners: Vec<String>,
    pub edit_users: Vec<String>,
    pub view_users: Vec<String>,
    pub edit_groups: Vec<String>,
    pub view_groups: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub date_sys_metadata_modified: DateTime<Utc>,
    pub published_and_frozen: bool,
    pub frozen: bool,
    pub doi: Option<String>,
    pub obsoletes: Option<ShortKey>,
    pub obsoleted_by: Option<ShortKey>,
    pub checksum_algorithm: String,
    pub bags: Vec<BagRecord>,
}

/// Aggregation document: what a resource is made of and where its metadata lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMap {
    pub short_key: ShortKey,
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub aggregates: Vec<ResourceMapEntry>,
    pub documented_by: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMapEntry {
    pub uri: String,
    pub name: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub sha256: Sha256Hash,
}

/// One line of a resource listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub short_key: ShortKey,
    pub title: String,
    pub resource_type: String,
    pub creator: String,
    pub updated: DateTime<Utc>,
    pub published_and_frozen: bool,
    pub obsoleted_by: Option<ShortKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> Resource {
        Resource::new(ShortKey::new(), "GenericResource", "Logan River", "alice", Utc::now())
            .unwrap()
    }

    #[test]
    fn new_grants_creator_full_access() {
        let r = resource();
        assert_eq!(r.owners, ["alice"]);
        assert_eq!(r.edit_users, ["alice"]);
        assert_eq!(r.view_users, ["alice"]);
        assert_eq!(r.slug, "logan-river");
    }

    #[test]
    fn edit_grants_view() {
        let mut r = resource();
        r.add_edit_user("bob");
        r.add_edit_group("hydro");
        assert!(r.view_users.contains(&"bob".to_string()));
        assert!(r.view_groups.contains(&"hydro".to_string()));
        assert!(r.can_edit("bob", &[]));
        assert!(r.can_edit("carol", &["hydro".to_string()]));
        assert!(!r.can_edit("carol", &[]));
    }

    #[test]
    fn restore_access_invariants_readds_owner() {
        let mut r = resource();
        r.edit_users.clear();
        r.view_users = vec!["zed".into()];
        r.restore_access_invariants();
        assert_eq!(r.edit_users, ["alice"]);
        assert!(r.view_users.contains(&"alice".to_string()));
    }

    #[test]
    fn dublin_core_terms_are_validated() {
        let dc = DublinCoreElement::new("Coverage", Some(" ".into()), " Utah ").unwrap();
        assert_eq!(dc.term, "coverage");
        assert_eq!(dc.qualifier, None);
        assert_eq!(dc.content, "Utah");

        assert!(DublinCoreElement::new("colour", None, "red").is_err());
        assert!(DublinCoreElement::new("title", None, "  ").is_err());
    }

    #[test]
    fn file_names_are_single_components() {
        assert!(validate_file_name("flow.csv").is_ok());
        for bad in ["", "..", ".", "a/b", "a\\b", " lead", "tab\there"] {
            assert!(validate_file_name(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn keywords_are_trimmed_and_deduplicated() {
        let kws = normalise_keywords(["flow", " flow ", "", "Utah"]);
        assert_eq!(kws, ["flow", "Utah"]);
    }

    #[test]
    fn new_version_links_back_and_unfreezes() {
        let mut r = resource();
        r.published_and_frozen = true;
        r.frozen = true;
        r.edit_users.clear();
        r.doi = Some("10.5072/hs.x".into());

        let next = r.new_version(ShortKey::new(), Utc::now());
        assert_eq!(next.obsoletes, Some(r.short_key.clone()));
        assert!(!next.published_and_frozen);
        assert!(next.doi.is_none());
        assert_eq!(next.edit_users, ["alice"]);
    }

    #[test]
    fn title_must_be_single_line() {
        let mut r = resource();
        assert!(r.set_title("two\nlines").is_err());
        r.set_title("Río Grande").unwrap();
        assert_eq!(r.slug, "rio-grande");
    }

    #[test]
    fn yaml_round_trip_preserves_record() {
        let r = resource();
        let yaml = serde_yaml::to_string(&r).unwrap();
        let back: Resource = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, r);
    }
}
