use std::sync::Arc;
use torii_gateway::Gateway;
use torii_server::config::ServerConfig;
use torii_server::store::MemStore;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Optional config file path as the first argument.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "torii.yaml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        tracing::info!("loading configuration from {}", config_path);
        ServerConfig::load_from_file(&config_path)?
    } else {
        tracing::warn!(
            "config file {} not found, loading from environment variables",
            config_path
        );
        ServerConfig::load_from_env()?
    };

    let store = Arc::new(MemStore::new());
    let mut gateway = Gateway::new(config.socket_addr()?, store);
    gateway.start().await?;

    tracing::info!(
        "gateway listening on gRPC {} and HTTP {}",
        gateway.addr()?,
        gateway.http_addr()?
    );

    // Wait for shutdown signal.
    tokio::signal::ctrl_c().await?;

    tracing::info!("received shutdown signal, gracefully shutting down");
    gateway.shutdown().await?;

    tracing::info!("shutdown complete");
    Ok(())
}
