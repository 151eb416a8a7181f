use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize console tracing. Safe to call more than once; later calls are no-ops.
pub fn init_telemetry(environment: &str) {
    let result = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetgate=debug,tower_http=debug,audit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init();

    if result.is_ok() {
        tracing::info!(environment = %environment, "Tracing initialized");
    }
}
