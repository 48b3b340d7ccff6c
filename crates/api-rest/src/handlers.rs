//! Route handlers.
//!
//! Handlers translate between wire types and core calls. Reads are open; mutations take the
//! acting user from `x-hs-user`.

use crate::error::{api_error, ApiError};
use crate::extract::ActingUser;
use crate::AppState;
use api_shared::{
    AddFilesReq, AddMemberReq, Base64FileDto, BagRes, CapabilitiesRes, ChecksumRes,
    CreateGroupReq, CreateResourceReq, CreateUserReq, DeletedFileRes, FileRes, FilesRes,
    GroupRes, HealthRes, HealthService, HistoryRes, ListResourcesRes, ListUsersRes, PidRes,
    ResourceFileRes, ResourceMapRes, ResourceRes, RevisionsRes, ScienceMetadataReq,
    ScienceMetadataRes, SystemMetadataRes, UpdateResourceReq, UserRes,
};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hsr_core::constants::DEFAULT_CONTENT_TYPE;
use hsr_core::{
    Base64File, NewResource, ResourceResult, ResourceUpdate, ScienceMetadataUpdate, UploadedFile,
};
use serde::Deserialize;
use utoipa::IntoParams;

type ApiResult<T> = Result<T, ApiError>;

fn decode_files(files: Vec<Base64FileDto>) -> ResourceResult<Vec<UploadedFile>> {
    files
        .into_iter()
        .map(|f| Base64File::from(f).decode())
        .collect()
}

fn science_update(req: ScienceMetadataReq) -> ScienceMetadataUpdate {
    ScienceMetadataUpdate {
        title: req.title,
        description: req.description,
        keywords: req.keywords,
        dublin_metadata: req
            .dublin_metadata
            .map(|d| d.into_iter().map(Into::into).collect()),
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct FileQuery {
    /// `base64` returns a JSON document instead of raw bytes.
    format: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint, open even when an API key is configured.
pub(crate) async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/resources",
    responses(
        (status = 200, description = "All resources", body = ListResourcesRes),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn list_resources(
    State(state): State<AppState>,
) -> ApiResult<Json<ListResourcesRes>> {
    let resources = state
        .service
        .list_resources()
        .map_err(|e| api_error("List resources", e))?;
    Ok(Json(ListResourcesRes {
        resources: resources.iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/resource",
    request_body = CreateResourceReq,
    responses(
        (status = 201, description = "Resource created", body = ResourceRes),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or unknown x-hs-user"),
        (status = 403, description = "Not allowed to create for this owner"),
        (status = 409, description = "Duplicate file names"),
        (status = 500, description = "Internal server error")
    )
)]
/// Create a resource, its files, access lists and metadata.
pub(crate) async fn create_resource(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    Json(req): Json<CreateResourceReq>,
) -> ApiResult<(StatusCode, Json<ResourceRes>)> {
    let files = decode_files(req.files).map_err(|e| api_error("Create resource", e))?;
    let new = NewResource {
        resource_type: req.resource_type,
        owner: req.owner,
        title: req.title,
        description: req.description,
        edit_users: req.edit_users,
        view_users: req.view_users,
        edit_groups: req.edit_groups,
        view_groups: req.view_groups,
        keywords: req.keywords,
        dublin_metadata: req.dublin_metadata.into_iter().map(Into::into).collect(),
        files,
    };

    let resource = state
        .service
        .create_resource(&requester, new)
        .map_err(|e| api_error("Create resource", e))?;
    Ok((StatusCode::CREATED, Json(ResourceRes::new(&resource, false))))
}

#[utoipa::path(
    get,
    path = "/resource/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Zipped BagIt archive of the current version (application/zip)"),
        (status = 400, description = "Malformed pid"),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Download the bag of the current version, creating it if needed.
pub(crate) async fn get_resource(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Response> {
    let download = state
        .service
        .get_resource(&pid)
        .map_err(|e| api_error("Get resource", e))?;
    let disposition = format!("attachment; filename=\"{}\"", download.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}

#[utoipa::path(
    put,
    path = "/resource/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    request_body = UpdateResourceReq,
    responses(
        (status = 200, description = "Resource updated", body = ResourceRes),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or unknown x-hs-user"),
        (status = 403, description = "No edit access"),
        (status = 404, description = "Resource not found"),
        (status = 409, description = "Resource already obsoleted"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn update_resource(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath(pid): AxumPath<String>,
    Json(req): Json<UpdateResourceReq>,
) -> ApiResult<Json<ResourceRes>> {
    let files = req
        .files
        .map(decode_files)
        .transpose()
        .map_err(|e| api_error("Update resource", e))?;
    let update = ResourceUpdate {
        title: req.title,
        description: req.description,
        owner: req.owner,
        edit_users: req.edit_users,
        view_users: req.view_users,
        edit_groups: req.edit_groups,
        view_groups: req.view_groups,
        keywords: req.keywords,
        dublin_metadata: req
            .dublin_metadata
            .map(|d| d.into_iter().map(Into::into).collect()),
        files,
    };

    let outcome = state
        .service
        .update_resource(&requester, &pid, update)
        .map_err(|e| api_error("Update resource", e))?;
    Ok(Json(ResourceRes::new(&outcome.value, outcome.new_version)))
}

#[utoipa::path(
    delete,
    path = "/resource/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Resource deleted", body = PidRes),
        (status = 403, description = "Not an owner, or resource is published"),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn delete_resource(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<PidRes>> {
    let key = state
        .service
        .delete_resource(&requester, &pid)
        .map_err(|e| api_error("Delete resource", e))?;
    Ok(Json(PidRes {
        pid: key.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/resource/{pid}/files/{filename}",
    params(
        ("pid" = String, Path, description = "Resource short key"),
        ("filename" = String, Path, description = "File name"),
        FileQuery
    ),
    responses(
        (status = 200, description = "File bytes, or a base64 document with ?format=base64"),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Resource or file not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn get_resource_file(
    State(state): State<AppState>,
    AxumPath((pid, filename)): AxumPath<(String, String)>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Response> {
    let content = state
        .service
        .get_resource_file(&pid, &filename)
        .map_err(|e| api_error("Get resource file", e))?;
    let media_type = content
        .file
        .media_type
        .clone()
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    match query.format.as_deref() {
        None | Some("raw") => Ok((
            [(header::CONTENT_TYPE, media_type)],
            content.bytes,
        )
            .into_response()),
        Some("base64") => {
            let mut encoded = Base64File::encode(content.file.name, &content.bytes);
            encoded.content_type = Some(media_type);
            Ok(Json(Base64FileDto::from(encoded)).into_response())
        }
        Some(other) => Err((
            StatusCode::BAD_REQUEST,
            format!("unsupported format '{}'", other),
        )),
    }
}

#[utoipa::path(
    post,
    path = "/resource/{pid}/files",
    params(("pid" = String, Path, description = "Resource short key")),
    request_body = AddFilesReq,
    responses(
        (status = 200, description = "Files added", body = FilesRes),
        (status = 400, description = "Bad request"),
        (status = 403, description = "No edit access"),
        (status = 404, description = "Resource not found"),
        (status = 409, description = "A file with that name exists"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn add_resource_files(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath(pid): AxumPath<String>,
    Json(req): Json<AddFilesReq>,
) -> ApiResult<Json<FilesRes>> {
    let uploads = decode_files(req.files).map_err(|e| api_error("Add files", e))?;
    let outcome = state
        .service
        .add_resource_files(&requester, &pid, uploads)
        .map_err(|e| api_error("Add files", e))?;
    Ok(Json(FilesRes {
        pid: outcome.short_key.to_string(),
        new_version: outcome.new_version,
        files: outcome.value.iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/resource/{pid}/files/{filename}",
    params(
        ("pid" = String, Path, description = "Resource short key"),
        ("filename" = String, Path, description = "File name")
    ),
    request_body = Base64FileDto,
    responses(
        (status = 200, description = "File replaced", body = FileRes),
        (status = 400, description = "Bad request"),
        (status = 403, description = "No edit access"),
        (status = 404, description = "Resource or file not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn update_resource_file(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath((pid, filename)): AxumPath<(String, String)>,
    Json(req): Json<Base64FileDto>,
) -> ApiResult<Json<FileRes>> {
    let upload = Base64File::from(req)
        .decode()
        .map_err(|e| api_error("Update file", e))?;
    let outcome = state
        .service
        .update_resource_file(&requester, &pid, &filename, upload)
        .map_err(|e| api_error("Update file", e))?;
    Ok(Json(FileRes {
        pid: outcome.short_key.to_string(),
        new_version: outcome.new_version,
        file: ResourceFileRes::from(&outcome.value),
    }))
}

#[utoipa::path(
    delete,
    path = "/resource/{pid}/files/{filename}",
    params(
        ("pid" = String, Path, description = "Resource short key"),
        ("filename" = String, Path, description = "File name")
    ),
    responses(
        (status = 200, description = "File deleted", body = DeletedFileRes),
        (status = 403, description = "No edit access"),
        (status = 404, description = "Resource or file not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn delete_resource_file(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath((pid, filename)): AxumPath<(String, String)>,
) -> ApiResult<Json<DeletedFileRes>> {
    let outcome = state
        .service
        .delete_resource_file(&requester, &pid, &filename)
        .map_err(|e| api_error("Delete file", e))?;
    Ok(Json(DeletedFileRes {
        pid: outcome.short_key.to_string(),
        new_version: outcome.new_version,
        filename: outcome.value,
    }))
}

#[utoipa::path(
    post,
    path = "/resource/{pid}/bags",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Bag of the current version", body = BagRes),
        (status = 401, description = "Missing or unknown x-hs-user"),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn create_bag(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<BagRes>> {
    let record = state
        .service
        .create_bag(&requester, &pid)
        .map_err(|e| api_error("Create bag", e))?;
    Ok(Json(BagRes::from(&record)))
}

#[utoipa::path(
    get,
    path = "/resource/{pid}/history",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Commit log, newest first", body = HistoryRes),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn history(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<HistoryRes>> {
    let commits = state
        .service
        .history(&pid)
        .map_err(|e| api_error("History", e))?;
    Ok(Json(HistoryRes {
        pid,
        commits: commits.iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/scimeta/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Science metadata", body = ScienceMetadataRes),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn get_science_metadata(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<ScienceMetadataRes>> {
    let meta = state
        .service
        .get_science_metadata(&pid)
        .map_err(|e| api_error("Get science metadata", e))?;
    Ok(Json(ScienceMetadataRes::new(&meta, false)))
}

#[utoipa::path(
    put,
    path = "/scimeta/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    request_body = ScienceMetadataReq,
    responses(
        (status = 200, description = "Science metadata updated", body = ScienceMetadataRes),
        (status = 400, description = "Bad request"),
        (status = 403, description = "No edit access"),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn update_science_metadata(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath(pid): AxumPath<String>,
    Json(req): Json<ScienceMetadataReq>,
) -> ApiResult<Json<ScienceMetadataRes>> {
    let outcome = state
        .service
        .update_science_metadata(&requester, &pid, science_update(req))
        .map_err(|e| api_error("Update science metadata", e))?;
    Ok(Json(ScienceMetadataRes::new(&outcome.value, outcome.new_version)))
}

#[utoipa::path(
    get,
    path = "/sysmeta/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "System metadata", body = SystemMetadataRes),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn get_system_metadata(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<SystemMetadataRes>> {
    let meta = state
        .service
        .get_system_metadata(&pid)
        .map_err(|e| api_error("Get system metadata", e))?;
    Ok(Json(SystemMetadataRes::from(&meta)))
}

#[utoipa::path(
    put,
    path = "/sysmeta/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    request_body = ScienceMetadataReq,
    responses(
        (status = 200, description = "Metadata updated", body = ScienceMetadataRes),
        (status = 400, description = "Bad request"),
        (status = 403, description = "No edit access"),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn update_system_metadata(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath(pid): AxumPath<String>,
    Json(req): Json<ScienceMetadataReq>,
) -> ApiResult<Json<ScienceMetadataRes>> {
    let outcome = state
        .service
        .update_system_metadata(&requester, &pid, science_update(req))
        .map_err(|e| api_error("Update system metadata", e))?;
    Ok(Json(ScienceMetadataRes::new(&outcome.value, outcome.new_version)))
}

#[utoipa::path(
    get,
    path = "/resourcemap/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Resource map", body = ResourceMapRes),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn get_resource_map(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<ResourceMapRes>> {
    let map = state
        .service
        .get_resource_map(&pid)
        .map_err(|e| api_error("Get resource map", e))?;
    Ok(Json(ResourceMapRes::from(&map)))
}

#[utoipa::path(
    get,
    path = "/capabilities/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Capabilities of the resource type", body = CapabilitiesRes),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn get_capabilities(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<CapabilitiesRes>> {
    let capabilities = state
        .service
        .get_capabilities(&pid)
        .map_err(|e| api_error("Get capabilities", e))?;
    Ok(Json(CapabilitiesRes { pid, capabilities }))
}

#[utoipa::path(
    get,
    path = "/revisions/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Bags created so far", body = RevisionsRes),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn get_revisions(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<RevisionsRes>> {
    let bags = state
        .service
        .get_revisions(&pid)
        .map_err(|e| api_error("Get revisions", e))?;
    Ok(Json(RevisionsRes {
        pid,
        bags: bags.iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/related/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 404, description = "Resource not found"),
        (status = 501, description = "Not implemented")
    )
)]
pub(crate) async fn get_related(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<Vec<String>>> {
    let related = state
        .service
        .get_related(&pid)
        .map_err(|e| api_error("Get related", e))?;
    Ok(Json(related.iter().map(ToString::to_string).collect()))
}

#[utoipa::path(
    get,
    path = "/checksum/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "MD5 of the current bag", body = ChecksumRes),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn get_checksum(
    State(state): State<AppState>,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<ChecksumRes>> {
    let checksum = state
        .service
        .get_checksum(&pid)
        .map_err(|e| api_error("Get checksum", e))?;
    Ok(Json(ChecksumRes {
        pid,
        algorithm: "MD5".to_string(),
        checksum,
    }))
}

#[utoipa::path(
    put,
    path = "/publishResource/{pid}",
    params(("pid" = String, Path, description = "Resource short key")),
    responses(
        (status = 200, description = "Resource published", body = ResourceRes),
        (status = 403, description = "Not an owner"),
        (status = 404, description = "Resource not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn publish_resource(
    State(state): State<AppState>,
    ActingUser(requester): ActingUser,
    AxumPath(pid): AxumPath<String>,
) -> ApiResult<Json<ResourceRes>> {
    let resource = state
        .service
        .publish_resource(&requester, &pid)
        .map_err(|e| api_error("Publish resource", e))?;
    Ok(Json(ResourceRes::new(&resource, false)))
}

#[utoipa::path(
    get,
    path = "/resolveDOI/{doi}",
    params(("doi" = String, Path, description = "DOI, e.g. 10.5072/hs.<pid>")),
    responses(
        (status = 200, description = "Resource holding the DOI", body = PidRes),
        (status = 404, description = "No resource has this DOI"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn resolve_doi(
    State(state): State<AppState>,
    AxumPath(doi): AxumPath<String>,
) -> ApiResult<Json<PidRes>> {
    let key = state
        .service
        .resolve_doi(&doi)
        .map_err(|e| api_error("Resolve DOI", e))?;
    Ok(Json(PidRes {
        pid: key.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User registered", body = UserRes),
        (status = 400, description = "Bad request"),
        (status = 409, description = "Username or email taken"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserReq>,
) -> ApiResult<(StatusCode, Json<UserRes>)> {
    let mut accounts = state
        .service
        .accounts()
        .map_err(|e| api_error("Create user", e))?;
    let user = accounts
        .add_user(&req.username, &req.email, req.full_name.as_deref())
        .map_err(|e| api_error("Create user", e))?;
    Ok((StatusCode::CREATED, Json(UserRes::from(&user))))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Registered users", body = ListUsersRes),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn list_users(State(state): State<AppState>) -> ApiResult<Json<ListUsersRes>> {
    let accounts = state
        .service
        .accounts()
        .map_err(|e| api_error("List users", e))?;
    Ok(Json(ListUsersRes {
        users: accounts.list_users().iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/groups",
    request_body = CreateGroupReq,
    responses(
        (status = 201, description = "Group registered", body = GroupRes),
        (status = 400, description = "Bad request"),
        (status = 409, description = "Group exists"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupReq>,
) -> ApiResult<(StatusCode, Json<GroupRes>)> {
    let mut accounts = state
        .service
        .accounts()
        .map_err(|e| api_error("Create group", e))?;
    let group = accounts
        .add_group(&req.name)
        .map_err(|e| api_error("Create group", e))?;
    Ok((StatusCode::CREATED, Json(GroupRes::from(&group))))
}

#[utoipa::path(
    post,
    path = "/groups/{name}/members",
    params(("name" = String, Path, description = "Group name")),
    request_body = AddMemberReq,
    responses(
        (status = 200, description = "Member added", body = GroupRes),
        (status = 400, description = "Unknown user or group"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn add_group_member(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
    Json(req): Json<AddMemberReq>,
) -> ApiResult<Json<GroupRes>> {
    let mut accounts = state
        .service
        .accounts()
        .map_err(|e| api_error("Add group member", e))?;
    let group = accounts
        .add_group_member(&name, &req.user)
        .map_err(|e| api_error("Add group member", e))?;
    Ok(Json(GroupRes::from(&group)))
}
