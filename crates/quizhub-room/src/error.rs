//! Error types for the room layer.

use quizhub_protocol::{ErrorCode, RoomCode, SessionId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The caller has no bound user id.
    #[error("a user id must be bound before joining rooms")]
    Unauthenticated,

    /// The session is not a member of the room it addressed.
    #[error("session {0} is not in the room")]
    NotInRoom(SessionId),

    /// The caller may not do this, or the room is in the wrong phase for it.
    #[error("forbidden or invalid state: {0}")]
    Forbidden(&'static str),

    /// The game loop refused the answer.
    #[error("answer rejected: {0}")]
    AnswerRejected(#[from] AnswerRejection),

    /// Every generated code collided with a live room.
    #[error("no free room code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },
}

impl RoomError {
    /// The error code reported back to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::NotFound(_) => ErrorCode::RoomNotFound,
            RoomError::Unauthenticated => ErrorCode::Unauthenticated,
            RoomError::NotInRoom(_) => ErrorCode::NotInRoom,
            RoomError::Forbidden(_) => ErrorCode::ForbiddenOrInvalidState,
            RoomError::AnswerRejected(_) => ErrorCode::AnswerRejected,
            RoomError::CodeSpaceExhausted { .. } => ErrorCode::HandlerError,
        }
    }
}

/// Why the game loop refused an answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerRejection {
    /// The match has not started, is between questions, or has ended.
    #[error("no question is open")]
    NoQuestionOpen,

    /// The answer names a question other than the open one.
    #[error("question {got} is not open (open: {open})")]
    WrongQuestion { open: String, got: String },

    /// This user already answered the open question.
    #[error("already answered this question")]
    AlreadyAnswered,
}
