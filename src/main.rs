use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, serve};
use hsr_core::CoreConfig;
use hsr_core::config::{
    bag_temp_dir_from_env_value, data_dir_from_env_value, doi_prefix_from_env_value,
    resource_types_from_env_value, version_label_from_env_value,
};

/// Main entry point for the HSR application
///
/// Loads `.env`, resolves the core configuration once and serves the REST API.
///
/// # Environment Variables
/// - `HSR_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HSR_DATA_DIR`: Data directory, must exist (default: "resource_data")
/// - `HSR_BAG_TEMP_DIR`: Bag staging root (default: system temp dir + "hsr-bags")
/// - `HSR_RESOURCE_TYPES`: Registered resource types (default: "GenericResource")
/// - `HSR_VERSION_LABEL`: `hydroshare_version` written to bags (default: "R1 development")
/// - `HSR_DOI_PREFIX`: DOI prefix used on publication (default: "10.5072")
/// - `API_KEY`: Optional key required in `x-api-key` on every route except `/health`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("hsr=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("HSR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let data_dir = data_dir_from_env_value(std::env::var("HSR_DATA_DIR").ok());
    if !data_dir.exists() {
        anyhow::bail!("Data directory does not exist: {}", data_dir.display());
    }

    let cfg = Arc::new(CoreConfig::new(
        data_dir,
        bag_temp_dir_from_env_value(std::env::var("HSR_BAG_TEMP_DIR").ok()),
        resource_types_from_env_value(std::env::var("HSR_RESOURCE_TYPES").ok())?,
        version_label_from_env_value(std::env::var("HSR_VERSION_LABEL").ok()),
        doi_prefix_from_env_value(std::env::var("HSR_DOI_PREFIX").ok()),
    )?);

    tracing::info!(
        data_dir = %cfg.data_dir().display(),
        version = cfg.version_label(),
        "++ Starting HSR REST on {}",
        rest_addr
    );

    serve(&rest_addr, AppState::new(cfg, std::env::var("API_KEY").ok())).await
}
