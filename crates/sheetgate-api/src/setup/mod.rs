//! Application setup and initialization
//!
//! Everything `main` needs to go from a loaded `Config` to a serving router.
//! `build_state` is split out so tests can assemble the app without telemetry.

pub mod routes;
pub mod server;
pub mod validation;

use crate::state::AppState;
use crate::transient::TransientStore;
use anyhow::{Context, Result};
use sheetgate_client::{
    ConversionClient, EndpointResolver, FilePreferenceStore, MemoryPreferenceStore,
    PreferenceStore,
};
use sheetgate_core::{Config, TokenSigner, UploadPolicy};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(&config.environment);

    tracing::info!(
        environment = %config.environment,
        engines = %config.engine_candidates().join(","),
        mime_strictness = %config.mime_strictness,
        "Configuration loaded and validated successfully"
    );

    let state = build_state(&config).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

/// Build shared state: transient storage, endpoint resolver, engine client.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>> {
    let transient = TransientStore::new(&config.transient_dir)
        .await
        .context("Failed to prepare transient storage")?;

    let store: Arc<dyn PreferenceStore> = match &config.engine_preference_file {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Persisting preferred engine to file");
            Arc::new(FilePreferenceStore::new(path))
        }
        None => Arc::new(MemoryPreferenceStore::new()),
    };
    let resolver = Arc::new(EndpointResolver::new(config.engine_candidates(), store));

    let signer = TokenSigner::new(
        &config.jwt_secret,
        config.jwt_subject.clone(),
        config.jwt_expiry_secs,
    );

    let engine = ConversionClient::new(resolver, signer.clone(), config.engine_timeout())
        .context("Failed to build conversion engine client")?;

    Ok(Arc::new(AppState {
        config: Arc::new(config.clone()),
        policy: UploadPolicy::from_config(config),
        engine,
        transient,
        signer,
    }))
}
