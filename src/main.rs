use dotenvy::dotenv;
use rupeewise::{config::settings::load_config, errors::Result, store::SeaOrmStore};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "settings.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    // 3. Load settings
    let config_path =
        env::var("RUPEEWISE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)
        .inspect_err(|e| error!("Failed to load settings from {config_path}: {e}"))?;

    // 4. Connect and make sure the schema exists
    SeaOrmStore::connect(&config.database.url)
        .await
        .inspect(|_| info!("Document store ready at {}", config.database.url))
        .inspect_err(|e| error!("Failed to initialize document store: {e}"))?;

    info!(
        "RupeeWise ready (max {} concurrent fetches, {} recent expenses)",
        config.aggregation.max_concurrent_fetches, config.aggregation.recent_expense_limit
    );
    Ok(())
}
