use sheetgate_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (telemetry, engine client, routes)
    let (state, router) = sheetgate_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    sheetgate_api::setup::server::start_server(&config, state, router).await?;

    Ok(())
}
