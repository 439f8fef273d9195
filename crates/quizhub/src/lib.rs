//! # quizhub
//!
//! Real-time multiplayer quiz server.
//!
//! Clients speak line-delimited JSON over TCP. A client says HELLO with a
//! user id, creates or joins a room by its six-digit code, and the room's
//! owner starts a match: a fixed sequence of timed questions where faster
//! correct answers score more. When the match ends the results go to the
//! room and, optionally, to an external record-keeping service.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizhub::prelude::*;
//!
//! # async fn run() -> Result<(), QuizError> {
//! let server = QuizServer::builder()
//!     .bind("0.0.0.0:5050")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod discovery;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use discovery::DiscoveryResponder;
pub use error::QuizError;
pub use server::{DEFAULT_SHUTDOWN_GRACE, QuizServer, QuizServerBuilder};

/// Common imports for running a server.
pub mod prelude {
    pub use crate::{DiscoveryResponder, QuizError, QuizServer, QuizServerBuilder, ServerConfig};
    pub use quizhub_protocol::{
        Envelope, ErrorCode, LineDecoder, MessageType, RoomCode, SessionId, UserId, encode_line,
    };
    pub use quizhub_report::{HttpMatchReporter, MatchReport, MatchReporter, NoopReporter};
    pub use quizhub_room::{Question, QuestionSource, RoomConfig, RoomRegistry, StaticQuestions};
}
