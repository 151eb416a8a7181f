//! Route configuration and setup.
//!
//! Health checks live in [health](health); the conversion and docs handlers
//! live in `crate::handlers`.

mod health;

use crate::auth::{auth_middleware, AuthState};
use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sheetgate_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let auth_state = Arc::new(AuthState {
        signer: state.signer.clone(),
    });

    let public_routes = public_routes();
    let protected_routes = protected_routes().layer(axum::middleware::from_fn_with_state(
        auth_state,
        auth_middleware,
    ));

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1_000)
        .max(1);

    let body_limit = config.max_upload_size_bytes + MULTIPART_OVERHEAD_BYTES;
    tracing::info!(
        http_concurrency_limit,
        body_limit_bytes = body_limit,
        "HTTP limits configured"
    );

    let app = public_routes
        .merge(protected_routes)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION];

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
    };
    Ok(cors)
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::docs::api_docs))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
}

fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/convert", post(handlers::convert::convert_file))
}
