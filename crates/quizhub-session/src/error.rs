//! Error types for the session layer.

use quizhub_protocol::UserId;

/// Errors that can occur while tracking a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session already has a different user bound.
    ///
    /// A connection identifies as one user for its whole lifetime.
    #[error("session already bound to user {bound}, refusing {requested}")]
    AlreadyBound { bound: UserId, requested: UserId },

    /// The session's outbound queue is gone, so its writer has exited.
    #[error("session {0} is closed")]
    Closed(quizhub_protocol::SessionId),
}
