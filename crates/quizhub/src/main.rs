//! quizhub server binary.
//!
//! Reads `QUIZHUB_CONFIG` (default `quizhub.yaml`), serves the line
//! protocol, answers UDP discovery if enabled, and shuts down on Ctrl-C.

use std::sync::Arc;

use quizhub::prelude::*;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), QuizError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cfg = ServerConfig::load_from_env()?;

    let reporter: Arc<dyn MatchReporter> = match cfg.report_config() {
        Some(report) => {
            tracing::info!(endpoint = %report.endpoint(), "match reports enabled");
            Arc::new(HttpMatchReporter::new(report)?)
        }
        None => {
            tracing::info!("no report endpoint configured, match reports disabled");
            Arc::new(NoopReporter)
        }
    };

    let server = QuizServer::builder()
        .bind(&cfg.listen)
        .room_config(cfg.room_config())
        .reporter(reporter)
        .shutdown_grace(cfg.shutdown_grace())
        .build()
        .await?;
    let tcp_port = server.local_addr()?.port();

    let (stop_tx, stop_rx) = watch::channel(false);

    let discovery = match cfg.discovery_port {
        Some(port) => match DiscoveryResponder::bind(port, tcp_port).await {
            Ok(responder) => Some(tokio::spawn(responder.run_until(stopped(stop_rx.clone())))),
            Err(e) => {
                tracing::warn!(port, error = %e, "UDP discovery unavailable");
                None
            }
        },
        None => None,
    };

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        let _ = stop_tx.send(true);
    });

    tracing::info!(listen = %cfg.listen, "quizhub starting");
    server.run_until(stopped(stop_rx)).await?;

    if let Some(task) = discovery {
        let _ = task.await;
    }
    Ok(())
}

/// Resolves once `true` is published on `rx`. A dropped sender never resolves.
async fn stopped(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
