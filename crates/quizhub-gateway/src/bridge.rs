//! One WebSocket client bridged to one upstream TCP connection.
//!
//! Responsibilities:
//! - Open the upstream connection and announce it with `GATEWAY_READY`
//! - WS text/binary JSON frames -> upstream lines
//! - Upstream lines -> WS text frames
//! - Liveness: ping on an interval, terminate when pongs stop
//! - Per-connection rate limit, closing both sides when exceeded
//! - Whichever side closes first, close the other

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use quizhub_protocol::{LineDecoder, encode_line};
use quizhub_transport::{Connection, TcpConnection};
use serde::Serialize;
use serde_json::value::RawValue;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{GatewayConfig, WindowRateLimiter};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Messages the gateway itself sends to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notice {
    #[serde(rename_all = "camelCase")]
    GatewayReady { tcp_host: String, tcp_port: u16 },
    GatewayTcpError { message: String },
    GatewayTcpClosed {},
    GatewayRateLimit {},
}

/// Why a bridge stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    ClientClosed,
    PongTimeout,
    RateLimited,
    UpstreamClosed,
    UpstreamFailed,
}

/// Runs one bridge until either side goes away.
pub async fn run_bridge(socket: WebSocket, peer: SocketAddr, config: Arc<GatewayConfig>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::info!(%peer, "client connected");

    let upstream = match TcpConnection::connect(&config.upstream).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(%peer, upstream = %config.upstream, error = %e, "upstream connect failed");
            send_notice(
                &mut ws_tx,
                &Notice::GatewayTcpError {
                    message: e.to_string(),
                },
            )
            .await;
            let _ = ws_tx.close().await;
            return;
        }
    };

    let (tcp_host, tcp_port) = match config.upstream_parts() {
        Some((host, port)) => (host.to_string(), port),
        None => {
            let addr = upstream.peer_addr();
            (addr.ip().to_string(), addr.port())
        }
    };
    tracing::debug!(%peer, conn_id = %upstream.id(), %tcp_host, tcp_port, "upstream connected");

    let teardown = if send_notice(&mut ws_tx, &Notice::GatewayReady { tcp_host, tcp_port }).await {
        pump(&mut ws_tx, &mut ws_rx, &upstream, &config, peer).await
    } else {
        Teardown::ClientClosed
    };

    // Upstream first, so the quiz server sees the disconnect right away.
    let _ = upstream.close().await;
    drop(upstream);

    if teardown != Teardown::PongTimeout {
        let _ = ws_tx.close().await;
    }
    tracing::info!(%peer, ?teardown, "client disconnected");
}

async fn pump(
    ws_tx: &mut WsSink,
    ws_rx: &mut WsStream,
    upstream: &TcpConnection,
    config: &GatewayConfig,
    peer: SocketAddr,
) -> Teardown {
    let mut limiter = WindowRateLimiter::new(config.rate_window(), config.rate_max, Instant::now());
    // Raw values: frames cross the bridge byte for byte, only validated.
    let mut decoder: LineDecoder<Box<RawValue>> = LineDecoder::new();

    let ping_every = config.ping_interval();
    let pong_timeout = config.pong_timeout();
    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            _ = ping_tick.tick() => {
                if last_pong.elapsed() > pong_timeout {
                    tracing::info!(%peer, "pong timeout, terminating");
                    return Teardown::PongTimeout;
                }
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    return Teardown::ClientClosed;
                }
            }

            incoming = ws_rx.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!(%peer, error = %e, "websocket error");
                        return Teardown::ClientClosed;
                    }
                    None => return Teardown::ClientClosed,
                };
                let data = match msg {
                    Message::Text(text) => text.into_bytes(),
                    Message::Binary(bytes) => bytes,
                    Message::Pong(_) => {
                        last_pong = Instant::now();
                        continue;
                    }
                    Message::Ping(_) => continue,
                    Message::Close(_) => return Teardown::ClientClosed,
                };

                if !limiter.allow(Instant::now()) {
                    tracing::warn!(%peer, "rate limit exceeded, closing");
                    send_notice(ws_tx, &Notice::GatewayRateLimit {}).await;
                    let _ = upstream.close().await;
                    let _ = ws_tx
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "rate limit exceeded".into(),
                        })))
                        .await;
                    return Teardown::RateLimited;
                }

                let value: Box<RawValue> = match serde_json::from_slice(&data) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::debug!(%peer, error = %e, "dropping non-JSON frame");
                        continue;
                    }
                };
                let line = match encode_line(&value) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(%peer, error = %e, "failed to encode line");
                        continue;
                    }
                };
                if let Err(e) = upstream.send(&line).await {
                    tracing::warn!(%peer, error = %e, "upstream send failed");
                    send_notice(ws_tx, &Notice::GatewayTcpError { message: e.to_string() }).await;
                    return Teardown::UpstreamFailed;
                }
            }

            received = upstream.recv() => match received {
                Ok(Some(chunk)) => {
                    for value in decoder.push(&chunk) {
                        if ws_tx.send(Message::Text(value.get().to_owned())).await.is_err() {
                            return Teardown::ClientClosed;
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!(%peer, "upstream closed");
                    send_notice(ws_tx, &Notice::GatewayTcpClosed {}).await;
                    return Teardown::UpstreamClosed;
                }
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "upstream receive failed");
                    send_notice(ws_tx, &Notice::GatewayTcpError { message: e.to_string() }).await;
                    return Teardown::UpstreamFailed;
                }
            },
        }
    }
}

/// Sends a notice. Returns `false` if the client is gone.
async fn send_notice(ws_tx: &mut WsSink, notice: &Notice) -> bool {
    let text = match serde_json::to_string(notice) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode notice");
            return true;
        }
    };
    ws_tx.send(Message::Text(text)).await.is_ok()
}
