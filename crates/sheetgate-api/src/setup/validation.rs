//! Configuration validation
//!
//! Startup checks that go beyond `Config::validate`: they need the runtime
//! environment (filesystem, process env) rather than the parsed values alone.

use anyhow::Result;
use sheetgate_core::Config;

/// Validate critical configuration values
///
/// Fails fast on settings that would leak details or break every request.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();
    let env_var = std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .ok();

    if is_production && env_var.is_none() {
        tracing::warn!(
            "Production mode detected but ENVIRONMENT/APP_ENV not set - error details may leak"
        );
    }

    if is_production && config.cors_origins.iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production. \
            Please set specific allowed origins via CORS_ORIGINS environment variable."
        ));
    }

    if config.transient_dir.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("TRANSIENT_DIR must not be empty"));
    }

    if config.engine_ready_timeout_secs == 0 {
        tracing::warn!("ENGINE_READY_TIMEOUT_SECS is 0 - startup will not wait for an engine");
    }

    if config.local_json_fallback {
        tracing::info!("Local JSON conversion fallback enabled");
    }

    Ok(())
}
