//! Payloads the server sends.
//!
//! One struct per outgoing message type. They all use camelCase on the
//! wire and derive `Deserialize` too, so clients and tests written in Rust
//! can read them back with [`Envelope::payload_as`](crate::Envelope::payload_as).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ErrorCode, RoomCode, SessionId, UserId};

// ---------------------------------------------------------------------------
// Session-level replies
// ---------------------------------------------------------------------------

/// `HELLO` push on connect and reply to a client `HELLO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    pub message: String,
    pub user_id: Option<UserId>,
    pub server_time: DateTime<Utc>,
}

/// `PONG` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PongPayload {
    pub ts: DateTime<Utc>,
}

/// `ERROR` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

/// Reply to an accepted `ANSWER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAckPayload {
    pub ok: bool,
    pub question_id: String,
    pub selected_option_index: usize,
}

// ---------------------------------------------------------------------------
// Room lifecycle
// ---------------------------------------------------------------------------

/// `ROOM_CREATED`, `LEFT_ROOM` and `MATCH_STARTED` all carry just the code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCodePayload {
    pub room_code: RoomCode,
}

/// `JOINED_ROOM` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoomPayload {
    pub room_code: RoomCode,
    pub session_id: SessionId,
    pub user_id: UserId,
}

/// `PLAYER_JOINED` broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedPayload {
    pub user_id: UserId,
    pub session_id: SessionId,
}

/// `PLAYER_LEFT` and `ANSWER_RECEIVED` broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub user_id: UserId,
}

// ---------------------------------------------------------------------------
// Players and scoring
// ---------------------------------------------------------------------------

/// One player's state inside a room.
///
/// Players stay in the room's table after disconnecting (`online` goes
/// false) so their score survives for the final results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub user_id: UserId,
    pub online: bool,
    pub has_answered: bool,
    pub score: u32,
}

impl PlayerState {
    /// A freshly joined, online player with no score.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            online: true,
            has_answered: false,
            score: 0,
        }
    }
}

/// `PLAYERS_SNAPSHOT` message: every player, best score first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayersSnapshot {
    pub room_code: RoomCode,
    pub players: Vec<PlayerState>,
}

/// `SCORE_UPDATE` broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdatePayload {
    pub user_id: UserId,
    pub delta: i32,
    pub total_score: u32,
}

/// `ANSWER_RESULT`, sent only to the player who answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResultPayload {
    pub question_id: String,
    pub is_correct: bool,
    pub delta: i32,
    pub total_score: u32,
}

// ---------------------------------------------------------------------------
// Questions and results
// ---------------------------------------------------------------------------

/// A question as clients see it: the correct index is never included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub question_id: String,
    pub title: String,
    pub options: Vec<String>,
}

/// One row of the final results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    pub user_id: UserId,
    pub score: u32,
    pub correct_answers: u32,
    pub total_answers: u32,
}

/// `MATCH_ENDED` broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEndedPayload {
    pub room_code: RoomCode,
    pub results: Vec<PlayerResult>,
}
