//! `QuizServer` builder and server loop.
//!
//! This is the entry point for running a quiz server. It ties together
//! all the layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quizhub_report::{MatchReporter, NoopReporter};
use quizhub_room::{QuestionSource, RoomConfig, RoomRegistry, StaticQuestions};
use quizhub_transport::{TcpTransport, Transport};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::QuizError;
use crate::handler::handle_connection;

/// Default grace period for sessions after shutdown is signalled.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Builder for configuring and starting a quiz server.
///
/// # Example
///
/// ```rust,ignore
/// use quizhub::prelude::*;
///
/// let server = QuizServer::builder()
///     .bind("0.0.0.0:5050")
///     .room_config(RoomConfig::default())
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct QuizServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    reporter: Option<Arc<dyn MatchReporter>>,
    questions: Option<Arc<dyn QuestionSource>>,
    shutdown_grace: Duration,
}

impl QuizServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "0.0.0.0:5050".to_string(),
            room_config: RoomConfig::default(),
            reporter: None,
            questions: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the question window and room code settings.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets where finished matches are reported. Defaults to [`NoopReporter`].
    pub fn reporter(mut self, reporter: Arc<dyn MatchReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Sets the question set. Defaults to [`StaticQuestions::default`].
    pub fn questions(mut self, questions: Arc<dyn QuestionSource>) -> Self {
        self.questions = Some(questions);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<QuizServer, QuizError> {
        let transport = TcpTransport::bind(&self.bind_addr).await?;

        let questions = self
            .questions
            .unwrap_or_else(|| Arc::new(StaticQuestions::default()));
        let reporter = self.reporter.unwrap_or_else(|| Arc::new(NoopReporter));
        let registry = Arc::new(RoomRegistry::new(self.room_config, questions, reporter));

        Ok(QuizServer {
            transport,
            registry,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

impl Default for QuizServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound quiz server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct QuizServer {
    transport: TcpTransport,
    registry: Arc<RoomRegistry>,
    shutdown_grace: Duration,
}

impl QuizServer {
    /// Creates a new builder.
    pub fn builder() -> QuizServerBuilder {
        QuizServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry shared by every session.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), QuizError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `signal` resolves, then shuts down.
    ///
    /// Shutdown stops accepting, tells every session to stop reading,
    /// waits up to the grace period for them to finish, aborts the rest,
    /// and finally aborts any running match.
    pub async fn run_until<F>(self, signal: F) -> Result<(), QuizError>
    where
        F: Future<Output = ()> + Send,
    {
        let QuizServer {
            mut transport,
            registry,
            shutdown_grace,
        } = self;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut sessions = JoinSet::new();
        tokio::pin!(signal);

        tracing::info!("quiz server running");
        loop {
            tokio::select! {
                _ = &mut signal => {
                    tracing::info!(sessions = sessions.len(), "shutdown requested");
                    break;
                }
                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        sessions.spawn(handle_connection(
                            conn,
                            Arc::clone(&registry),
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                // Reap finished sessions so the set does not grow unbounded.
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "session task panicked");
                        }
                    }
                }
            }
        }

        transport.shutdown();
        let _ = shutdown_tx.send(true);

        let drained = tokio::time::timeout(shutdown_grace, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = sessions.len(),
                "shutdown grace elapsed, aborting sessions"
            );
            sessions.abort_all();
            while sessions.join_next().await.is_some() {}
        }

        registry.shutdown();
        tracing::info!("quiz server stopped");
        Ok(())
    }
}
