//! Axum router wiring: `/` upgrades to the bridge, `/health` answers health checks.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::GatewayConfig;
use crate::bridge::run_bridge;

/// Builds the gateway's routes.
///
/// The WebSocket route reads the peer address, so serve this with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(config: GatewayConfig) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(Arc::new(config))
}

async fn ws_upgrade(
    State(config): State<Arc<GatewayConfig>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_bridge(socket, peer, config))
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
