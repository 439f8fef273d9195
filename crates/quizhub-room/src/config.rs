//! Room configuration and the match state machine.

use std::time::Duration;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// How long each question stays open for answers.
    pub question_window: Duration,

    /// How many random codes to try before giving up on `create_room`.
    pub max_code_attempts: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            question_window: Duration::from_secs(10),
            max_code_attempts: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchPhase
// ---------------------------------------------------------------------------

/// Where a room's match is in its life.
///
/// Transitions only move forward:
///
/// ```text
/// NotStarted -> Running{0} -> Running{1} -> ... -> Ended
/// ```
///
/// - **NotStarted**: the loop exists but has not opened a question.
/// - **Running**: question `question_index` is open for answers.
/// - **Ended**: every question has closed. There is no rematch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    NotStarted,
    Running { question_index: usize },
    Ended,
}

impl MatchPhase {
    /// The open question's index, if one is open.
    pub fn question_index(&self) -> Option<usize> {
        match self {
            Self::Running { question_index } => Some(*question_index),
            _ => None,
        }
    }

    /// Returns `true` once the match has finished.
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// The phase after this one in a match of `total` questions.
    pub fn advance(self, total: usize) -> Self {
        match self {
            Self::NotStarted if total > 0 => Self::Running { question_index: 0 },
            Self::Running { question_index } if question_index + 1 < total => Self::Running {
                question_index: question_index + 1,
            },
            _ => Self::Ended,
        }
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::Running { question_index } => write!(f, "Running({question_index})"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}
