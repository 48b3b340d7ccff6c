//! # API REST
//!
//! REST API implementation for HSR.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status codes, headers, CORS)
//!
//! Uses `api-shared` for request/response types and `hsr-core` for every data operation.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
mod handlers;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use hsr_core::{CoreConfig, ResourceService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ResourceService,
    /// When set, every route except `/health` requires a matching `x-api-key` header.
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, api_key: Option<String>) -> Self {
        Self {
            service: ResourceService::new(cfg),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_resources,
        handlers::create_resource,
        handlers::get_resource,
        handlers::update_resource,
        handlers::delete_resource,
        handlers::get_resource_file,
        handlers::add_resource_files,
        handlers::update_resource_file,
        handlers::delete_resource_file,
        handlers::create_bag,
        handlers::history,
        handlers::get_science_metadata,
        handlers::update_science_metadata,
        handlers::get_system_metadata,
        handlers::update_system_metadata,
        handlers::get_resource_map,
        handlers::get_capabilities,
        handlers::get_revisions,
        handlers::get_related,
        handlers::get_checksum,
        handlers::publish_resource,
        handlers::resolve_doi,
        handlers::create_user,
        handlers::list_users,
        handlers::create_group,
        handlers::add_group_member,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::Base64FileDto,
        api_shared::DublinCoreDto,
        api_shared::CreateResourceReq,
        api_shared::UpdateResourceReq,
        api_shared::ScienceMetadataReq,
        api_shared::AddFilesReq,
        api_shared::CreateUserReq,
        api_shared::CreateGroupReq,
        api_shared::AddMemberReq,
        api_shared::PidRes,
        api_shared::ResourceFileRes,
        api_shared::BagRes,
        api_shared::ResourceRes,
        api_shared::ScienceMetadataRes,
        api_shared::SystemMetadataRes,
        api_shared::AggregateRes,
        api_shared::ResourceMapRes,
        api_shared::CapabilitiesRes,
        api_shared::FilesRes,
        api_shared::FileRes,
        api_shared::DeletedFileRes,
        api_shared::RevisionsRes,
        api_shared::ChecksumRes,
        api_shared::ResourceSummaryRes,
        api_shared::ListResourcesRes,
        api_shared::CommitRes,
        api_shared::HistoryRes,
        api_shared::UserRes,
        api_shared::ListUsersRes,
        api_shared::GroupRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/resources", get(handlers::list_resources))
        .route("/resource", post(handlers::create_resource))
        .route(
            "/resource/:pid",
            get(handlers::get_resource)
                .put(handlers::update_resource)
                .delete(handlers::delete_resource),
        )
        .route("/resource/:pid/files", post(handlers::add_resource_files))
        .route(
            "/resource/:pid/files/:filename",
            get(handlers::get_resource_file)
                .put(handlers::update_resource_file)
                .delete(handlers::delete_resource_file),
        )
        .route("/resource/:pid/bags", post(handlers::create_bag))
        .route("/resource/:pid/history", get(handlers::history))
        .route(
            "/scimeta/:pid",
            get(handlers::get_science_metadata).put(handlers::update_science_metadata),
        )
        .route(
            "/sysmeta/:pid",
            get(handlers::get_system_metadata).put(handlers::update_system_metadata),
        )
        .route("/resourcemap/:pid", get(handlers::get_resource_map))
        .route("/capabilities/:pid", get(handlers::get_capabilities))
        .route("/revisions/:pid", get(handlers::get_revisions))
        .route("/related/:pid", get(handlers::get_related))
        .route("/checksum/:pid", get(handlers::get_checksum))
        .route("/publishResource/:pid", put(handlers::publish_resource))
        .route("/resolveDOI/*doi", get(handlers::resolve_doi))
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/groups", post(handlers::create_group))
        .route("/groups/:name/members", post(handlers::add_group_member))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            extract::require_api_key,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the router on `addr` until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
