use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use riskwatch_engine::chain::RpcChainReader;
use riskwatch_engine::config::Config;
use riskwatch_engine::monitor::{MonitorEngine, MonitorRules};
use riskwatch_engine::store::PgAnalysisStore;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("RiskWatch Engine starting");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path);

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| eyre::eyre!("Failed to connect to database: {}", e))?;

    tracing::info!("Connected to PostgreSQL");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| eyre::eyre!("Failed to run migrations: {}", e))?;

    tracing::info!("Database migrations complete");

    let chain = RpcChainReader::connect_http(
        &config.chain.rpc_http,
        Duration::from_secs(config.chain.request_timeout_secs),
    )?;
    let store = PgAnalysisStore::new(pool);

    let engine = Arc::new(MonitorEngine::new(
        config.monitor.engine_settings(),
        config.monitor.risk_thresholds(),
        Arc::new(chain),
        Arc::new(store),
    ));

    // Spawn API server
    if config.api.enabled {
        let api_engine = Arc::clone(&engine);
        let host = config.api.host.clone();
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = riskwatch_engine::api::serve(api_engine, &host, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        });
    }

    // Auto-start monitoring for configured addresses
    if !config.monitor.addresses.is_empty() {
        engine
            .start_monitoring(&config.monitor.addresses, MonitorRules::default())
            .await
            .map_err(|e| eyre::eyre!("Failed to start monitoring: {}", e))?;
        tracing::info!(
            addresses = config.monitor.addresses.len(),
            "Monitoring auto-started from configuration"
        );
    } else {
        tracing::info!("No addresses configured; waiting for start via API");
    }

    tracing::info!("RiskWatch Engine running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping monitor...");
    engine.stop_monitoring().await;

    tracing::info!("RiskWatch Engine stopped gracefully");
    Ok(())
}
