//! sheetgate — command-line client for the conversion gateway.
//!
//! Set JWT_SECRET to the gateway's signing secret. Gateways come from
//! `--gateway`, SHEETGATE_GATEWAY_URLS and the remembered last good gateway.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sheetgate_cli::{
    default_output_path, gateway_candidates, init_tracing, preference_path, upload_from_path,
    ConvertSummary,
};
use sheetgate_client::{ConversionClient, EndpointResolver, FilePreferenceStore};
use sheetgate_core::{ConversionOutcome, TokenSigner};

#[derive(Parser)]
#[command(name = "sheetgate", about = "Convert spreadsheets to XLSX through a sheetgate gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GatewayArgs {
    /// Gateway base URL; repeat to add fallbacks
    #[arg(long = "gateway")]
    gateways: Vec<String>,
    /// Comma-separated gateway URLs tried after --gateway
    #[arg(long, env = "SHEETGATE_GATEWAY_URLS")]
    gateway_urls: Option<String>,
    /// File remembering the last gateway that worked
    #[arg(long, env = "SHEETGATE_PREFERENCE_FILE")]
    preference_file: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, default_value = "60")]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a csv, xls, xlsx, ods or json file and save the XLSX result
    Convert {
        /// Path to the file to convert
        file: PathBuf,
        /// Where to write the workbook (default: <stem>.xlsx next to the input)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Shared signing secret
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
        #[command(flatten)]
        gateway: GatewayArgs,
    },
    /// Report which gateway answers its health check
    Health {
        #[command(flatten)]
        gateway: GatewayArgs,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn build_client(args: &GatewayArgs, secret: &str) -> anyhow::Result<ConversionClient> {
    let configured = gateway_candidates(&args.gateways, args.gateway_urls.as_deref());
    let store = FilePreferenceStore::new(preference_path(args.preference_file.as_deref()));
    let resolver = Arc::new(EndpointResolver::new(configured, Arc::new(store)));
    let signer = TokenSigner::new(secret, "sheetgate-cli", 3600);

    ConversionClient::new(resolver, signer, Duration::from_secs(args.timeout.max(1)))
        .context("Failed to build gateway client")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            file,
            output,
            secret,
            gateway,
        } => {
            let upload = upload_from_path(&file)?;
            let client = build_client(&gateway, &secret)?;

            match client.convert_resolved(&upload).await? {
                ConversionOutcome::Success {
                    payload,
                    suggested_filename,
                    endpoint,
                    ..
                } => {
                    let output = output.unwrap_or_else(|| default_output_path(&file));
                    tokio::fs::write(&output, &payload)
                        .await
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    print_json(&ConvertSummary {
                        input: file.display().to_string(),
                        output: output.display().to_string(),
                        gateway: endpoint,
                        bytes: payload.len(),
                        suggested_filename,
                    })?;
                }
                ConversionOutcome::BackendError {
                    status_code,
                    message,
                } => {
                    anyhow::bail!("Conversion rejected (HTTP {}): {}", status_code, message);
                }
                ConversionOutcome::TransportError { cause } => {
                    anyhow::bail!("No gateway reachable: {}", cause);
                }
            }
        }
        Commands::Health { gateway } => {
            // Health probes are unauthenticated; the signer is never used.
            let client = build_client(&gateway, "")?;
            let candidates = client.resolver().resolve_candidates().await?;
            let healthy = client.first_healthy(&candidates).await;
            print_json(&serde_json::json!({
                "healthy": healthy.is_some(),
                "gateway": healthy,
                "candidates": candidates,
            }))?;
            if healthy.is_none() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
