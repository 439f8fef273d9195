//! Unified error type for the quiz server.

use quizhub_protocol::ProtocolError;
use quizhub_report::ReportError;
use quizhub_room::RoomError;
use quizhub_session::SessionError;
use quizhub_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (identity binding, closed queue).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (not found, forbidden, rejected answer).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The match reporter could not be built.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// The configuration file is unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Any other I/O failure (discovery socket, local address).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
