//! WebSocket gateway for quizhub.
//!
//! Browsers cannot open raw TCP sockets, so the gateway accepts WebSocket
//! clients and gives each one its own TCP connection to the quiz server.
//! JSON passes through unchanged; the gateway only re-frames it (WS
//! frames on one side, newline-delimited lines on the other) and adds a
//! few notices of its own.

mod bridge;
pub mod config;
mod error;
mod rate_limit;
mod router;

pub use bridge::{Notice, run_bridge};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use rate_limit::WindowRateLimiter;
pub use router::build_router;

use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Serves the gateway on `listener` until the process stops.
pub async fn serve(listener: TcpListener, config: GatewayConfig) -> Result<(), GatewayError> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, upstream = %config.upstream, "gateway listening");

    let app = build_router(config);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
