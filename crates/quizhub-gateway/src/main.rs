//! quizhub-gateway binary.
//!
//! Reads `QUIZHUB_GATEWAY_CONFIG` (default `gateway.yaml`) and bridges
//! WebSocket clients to the quiz server until Ctrl-C.

use quizhub_gateway::{GatewayConfig, GatewayError, serve};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cfg = GatewayConfig::load_from_env()?;
    let listener = tokio::net::TcpListener::bind(&cfg.listen).await?;
    tracing::info!(listen = %cfg.listen, "quizhub-gateway starting");

    tokio::select! {
        result = serve(listener, cfg) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    }
}
