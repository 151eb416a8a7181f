//! Server startup and graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use sheetgate_core::validation::format_size_limit;
use sheetgate_core::Config;
use tokio::net::TcpListener;

use crate::constants::ENGINE_READY_POLL_INTERVAL_MS;
use crate::state::AppState;

/// Start the server with graceful shutdown
///
/// Waits (bounded by `ENGINE_READY_TIMEOUT_SECS`) for an engine to answer its
/// health probe before announcing readiness; serves either way.
pub async fn start_server(config: &Config, state: Arc<AppState>, app: Router) -> Result<()> {
    let listener =
        bind_with_fallback("0.0.0.0", config.server_port, config.port_fallback_attempts).await?;

    match wait_for_engine(&state, config.engine_ready_timeout()).await {
        Some(engine) => tracing::info!(engine = %engine, "Conversion engine reachable"),
        None => tracing::warn!(
            timeout_secs = config.engine_ready_timeout_secs,
            "No conversion engine reachable yet; /ready will report not_ready until one answers"
        ),
    }

    tracing::info!(
        upload_limit = %format_size_limit(config.max_upload_size_bytes as u64),
        extensions = %config.allowed_extensions.join(","),
        mime_strictness = %config.mime_strictness,
        transient_dir = %config.transient_dir.display(),
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Bind `host:port`, moving to the next port while the current one is in use.
///
/// At most `attempts` consecutive ports are tried. Any error other than
/// `AddrInUse` stops immediately.
pub async fn bind_with_fallback(host: &str, port: u16, attempts: u16) -> Result<TcpListener> {
    let mut last_error = None;

    for offset in 0..attempts.max(1) {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        let addr = format!("{}:{}", host, candidate);
        tracing::info!(addr = %addr, attempt = offset + 1, attempts, "Starting server");

        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                let bound = listener.local_addr()?;
                if candidate != port {
                    tracing::warn!(
                        preferred_port = port,
                        port = bound.port(),
                        "Preferred port in use, listening on alternative port"
                    );
                }
                tracing::info!(addr = %bound, "Listening");
                return Ok(listener);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::warn!(port = candidate, "Port already in use, trying next port");
                last_error = Some(e);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to bind {}", addr)),
        }
    }

    let last_port = port.saturating_add(attempts.max(1) - 1);
    match last_error {
        Some(e) => Err(e).with_context(|| {
            format!("All ports {}-{} on {} are in use", port, last_port, host)
        }),
        None => Err(anyhow::anyhow!("No port available from {} on {}", port, host)),
    }
}

/// Poll every candidate's `/health` until one answers or `timeout` elapses.
pub async fn wait_for_engine(state: &AppState, timeout: Duration) -> Option<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    let interval = Duration::from_millis(ENGINE_READY_POLL_INTERVAL_MS);

    loop {
        let candidates = match state.engine.resolver().resolve_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "No engine candidates configured");
                return None;
            }
        };

        if let Some(engine) = state.engine.first_healthy(&candidates).await {
            return Some(engine);
        }

        if tokio::time::Instant::now() + interval > deadline {
            return None;
        }
        tracing::debug!("Waiting for conversion engine to become healthy");
        tokio::time::sleep(interval).await;
    }
}

/// Signal handler for graceful shutdown
///
/// Listens for Ctrl+C (SIGINT) and SIGTERM signals to initiate graceful shutdown.
///
/// # Panics
/// - Panics if Ctrl+C signal handler cannot be installed (unrecoverable system error)
/// - On Unix systems, panics if SIGTERM signal handler cannot be installed (unrecoverable system error)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
