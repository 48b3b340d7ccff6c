//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, configured from environment variables.
//!
//! ## Intended use
//! Useful for development and debugging. The workspace's main `hsr-run` binary does the same
//! after loading a `.env` file.

use api_rest::{serve, AppState};
use hsr_core::config::{
    bag_temp_dir_from_env_value, data_dir_from_env_value, doi_prefix_from_env_value,
    resource_types_from_env_value, version_label_from_env_value,
};
use hsr_core::CoreConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("HSR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting HSR REST API on {}", addr);

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

    serve(&addr, AppState::new(cfg, std::env::var("API_KEY").ok())).await
}
