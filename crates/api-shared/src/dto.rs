//! Request and response bodies.
//!
//! Identifiers, hashes and timestamps cross the wire as strings: short keys in their
//! canonical 32-hex form, timestamps as RFC 3339.

use hsr_core::{
    Base64File, BagRecord, CommitInfo, DublinCoreElement, Group, Resource, ResourceFile,
    ResourceMap, ResourceSummary, ScienceMetadata, SystemMetadata, User,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// A file carried inside a JSON body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Base64FileDto {
    pub name: String,
    /// Base64 encoded content.
    pub file: String,
    #[serde(default, alias = "content-type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl From<Base64FileDto> for Base64File {
    fn from(dto: Base64FileDto) -> Self {
        Base64File {
            name: dto.name,
            file: dto.file,
            content_type: dto.content_type,
        }
    }
}

impl From<Base64File> for Base64FileDto {
    fn from(file: Base64File) -> Self {
        Self {
            name: file.name,
            file: file.file,
            content_type: file.content_type,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DublinCoreDto {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    pub content: String,
}

impl From<DublinCoreDto> for DublinCoreElement {
    fn from(dto: DublinCoreDto) -> Self {
        DublinCoreElement {
            term: dto.term,
            qualifier: dto.qualifier,
            content: dto.content,
        }
    }
}

impl From<&DublinCoreElement> for DublinCoreDto {
    fn from(e: &DublinCoreElement) -> Self {
        Self {
            term: e.term.clone(),
            qualifier: e.qualifier.clone(),
            content: e.content.clone(),
        }
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateResourceReq {
    pub resource_type: String,
    /// Username or email of the owner. Defaults to the requesting user.
    #[serde(default)]
    pub owner: Option<String>,
    pub title: String,
    #[serde(default, alias = "abstract")]
    pub description: Option<String>,
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
    pub dublin_metadata: Vec<DublinCoreDto>,
    #[serde(default)]
    pub files: Vec<Base64FileDto>,
}

/// Every provided field replaces the stored value; `owner` adds an owner.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateResourceReq {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "abstract")]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub edit_users: Option<Vec<String>>,
    #[serde(default)]
    pub view_users: Option<Vec<String>>,
    #[serde(default)]
    pub edit_groups: Option<Vec<String>>,
    #[serde(default)]
    pub view_groups: Option<Vec<String>>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub dublin_metadata: Option<Vec<DublinCoreDto>>,
    #[serde(default)]
    pub files: Option<Vec<Base64FileDto>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ScienceMetadataReq {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "abstract")]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub dublin_metadata: Option<Vec<DublinCoreDto>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AddFilesReq {
    pub files: Vec<Base64FileDto>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserReq {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateGroupReq {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AddMemberReq {
    /// Username or email.
    pub user: String,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PidRes {
    pub pid: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceFileRes {
    pub name: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub stored_at: String,
}

impl From<&ResourceFile> for ResourceFileRes {
    fn from(f: &ResourceFile) -> Self {
        Self {
            name: f.name.clone(),
            sha256: f.hash.to_string(),
            size_bytes: f.size_bytes,
            media_type: f.media_type.clone(),
            stored_at: f.stored_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BagRes {
    pub version: String,
    pub timestamp: String,
    pub filename: String,
    pub md5: String,
    pub size_bytes: u64,
}

impl From<&BagRecord> for BagRes {
    fn from(b: &BagRecord) -> Self {
        Self {
            version: b.version.to_string(),
            timestamp: b.timestamp.to_rfc3339(),
            filename: b.filename.clone(),
            md5: b.md5.to_string(),
            size_bytes: b.size_bytes,
        }
    }
}

/// A full resource record.
///
/// `new_version` is true when the request changed a published resource and the change
/// landed in a new record (`pid`) that obsoletes the requested one.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceRes {
    pub pid: String,
    pub new_version: bool,
    pub resource_type: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub creator: String,
    pub owners: Vec<String>,
    pub edit_users: Vec<String>,
    pub view_users: Vec<String>,
    pub edit_groups: Vec<String>,
    pub view_groups: Vec<String>,
    pub keywords: Vec<String>,
    pub dublin_metadata: Vec<DublinCoreDto>,
    pub files: Vec<ResourceFileRes>,
    pub bags: Vec<BagRes>,
    pub created: String,
    pub updated: String,
    pub published_and_frozen: bool,
    pub doi: Option<String>,
    pub obsoletes: Option<String>,
    pub obsoleted_by: Option<String>,
}

impl ResourceRes {
    pub fn new(r: &Resource, new_version: bool) -> Self {
        Self {
            pid: r.short_key.to_string(),
            new_version,
            resource_type: r.resource_type.clone(),
            title: r.title.clone(),
            slug: r.slug.clone(),
            description: r.description.clone(),
            creator: r.creator.clone(),
            owners: r.owners.clone(),
            edit_users: r.edit_users.clone(),
            view_users: r.view_users.clone(),
            edit_groups: r.edit_groups.clone(),
            view_groups: r.view_groups.clone(),
            keywords: r.keywords.clone(),
            dublin_metadata: r.dublin_metadata.iter().map(Into::into).collect(),
            files: r.files.iter().map(Into::into).collect(),
            bags: r.bags.iter().map(Into::into).collect(),
            created: r.created.to_rfc3339(),
            updated: r.updated.to_rfc3339(),
            published_and_frozen: r.published_and_frozen,
            doi: r.doi.clone(),
            obsoletes: r.obsoletes.as_ref().map(ToString::to_string),
            obsoleted_by: r.obsoleted_by.as_ref().map(ToString::to_string),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScienceMetadataRes {
    pub pid: String,
    pub new_version: bool,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub dublin_metadata: Vec<DublinCoreDto>,
}

impl ScienceMetadataRes {
    pub fn new(m: &ScienceMetadata, new_version: bool) -> Self {
        Self {
            pid: m.short_key.to_string(),
            new_version,
            title: m.title.clone(),
            description: m.description.clone(),
            keywords: m.keywords.clone(),
            dublin_metadata: m.dublin_metadata.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SystemMetadataRes {
    pub pid: String,
    pub resource_type: String,
    pub slug: String,
    pub creator: String,
    pub owners: Vec<String>,
    pub edit_users: Vec<String>,
    pub view_users: Vec<String>,
    pub edit_groups: Vec<String>,
    pub view_groups: Vec<String>,
    pub created: String,
    pub updated: String,
    pub date_sys_metadata_modified: String,
    pub published_and_frozen: bool,
    pub frozen: bool,
    pub doi: Option<String>,
    pub obsoletes: Option<String>,
    pub obsoleted_by: Option<String>,
    pub checksum_algorithm: String,
    pub bags: Vec<BagRes>,
}

impl From<&SystemMetadata> for SystemMetadataRes {
    fn from(m: &SystemMetadata) -> Self {
        Self {
            pid: m.short_key.to_string(),
            resource_type: m.resource_type.clone(),
            slug: m.slug.clone(),
            creator: m.creator.clone(),
            owners: m.owners.clone(),
            edit_users: m.edit_users.clone(),
            view_users: m.view_users.clone(),
            edit_groups: m.edit_groups.clone(),
            view_groups: m.view_groups.clone(),
            created: m.created.to_rfc3339(),
            updated: m.updated.to_rfc3339(),
            date_sys_metadata_modified: m.date_sys_metadata_modified.to_rfc3339(),
            published_and_frozen: m.published_and_frozen,
            frozen: m.frozen,
            doi: m.doi.clone(),
            obsoletes: m.obsoletes.as_ref().map(ToString::to_string),
            obsoleted_by: m.obsoleted_by.as_ref().map(ToString::to_string),
            checksum_algorithm: m.checksum_algorithm.clone(),
            bags: m.bags.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AggregateRes {
    pub uri: String,
    pub name: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub sha256: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceMapRes {
    pub pid: String,
    pub title: String,
    pub created: String,
    pub updated: String,
    pub aggregates: Vec<AggregateRes>,
    pub documented_by: Vec<String>,
}

impl From<&ResourceMap> for ResourceMapRes {
    fn from(m: &ResourceMap) -> Self {
        Self {
            pid: m.short_key.to_string(),
            title: m.title.clone(),
            created: m.created.to_rfc3339(),
            updated: m.updated.to_rfc3339(),
            aggregates: m
                .aggregates
                .iter()
                .map(|a| AggregateRes {
                    uri: a.uri.clone(),
                    name: a.name.clone(),
                    size_bytes: a.size_bytes,
                    media_type: a.media_type.clone(),
                    sha256: a.sha256.to_string(),
                })
                .collect(),
            documented_by: m.documented_by.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CapabilitiesRes {
    pub pid: String,
    pub capabilities: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FilesRes {
    pub pid: String,
    pub new_version: bool,
    pub files: Vec<ResourceFileRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FileRes {
    pub pid: String,
    pub new_version: bool,
    pub file: ResourceFileRes,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedFileRes {
    pub pid: String,
    pub new_version: bool,
    pub filename: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RevisionsRes {
    pub pid: String,
    pub bags: Vec<BagRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ChecksumRes {
    pub pid: String,
    pub algorithm: String,
    pub checksum: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceSummaryRes {
    pub pid: String,
    pub title: String,
    pub resource_type: String,
    pub creator: String,
    pub updated: String,
    pub published_and_frozen: bool,
    pub obsoleted_by: Option<String>,
}

impl From<&ResourceSummary> for ResourceSummaryRes {
    fn from(s: &ResourceSummary) -> Self {
        Self {
            pid: s.short_key.to_string(),
            title: s.title.clone(),
            resource_type: s.resource_type.clone(),
            creator: s.creator.clone(),
            updated: s.updated.to_rfc3339(),
            published_and_frozen: s.published_and_frozen,
            obsoleted_by: s.obsoleted_by.as_ref().map(ToString::to_string),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListResourcesRes {
    pub resources: Vec<ResourceSummaryRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CommitRes {
    pub id: String,
    pub summary: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub time: String,
}

impl From<&CommitInfo> for CommitRes {
    fn from(c: &CommitInfo) -> Self {
        Self {
            id: c.id.clone(),
            summary: c.summary.clone(),
            message: c.message.clone(),
            author_name: c.author_name.clone(),
            author_email: c.author_email.clone(),
            time: c.time.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryRes {
    pub pid: String,
    pub commits: Vec<CommitRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UserRes {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
}

impl From<&User> for UserRes {
    fn from(u: &User) -> Self {
        Self {
            username: u.username.as_str().to_string(),
            email: u.email.as_str().to_string(),
            full_name: u.full_name.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListUsersRes {
    pub users: Vec<UserRes>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct GroupRes {
    pub name: String,
    pub members: Vec<String>,
}

impl From<&Group> for GroupRes {
    fn from(g: &Group) -> Self {
        Self {
            name: g.name.as_str().to_string(),
            members: g.members.clone(),
        }
    }
}
