//! Identity types and the message-type registry.
//!
//! Everything in here is small and `Copy` (or nearly so): the ids that
//! name users, sessions and rooms, plus the closed sets of message types
//! and error codes that both sides of the wire agree on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The stable identity of a player, supplied by the client at HELLO time.
///
/// This is a "newtype wrapper" around a UUID. Wrapping means you cannot
/// pass a `SessionId` where a `UserId` is expected, even though both are
/// UUIDs underneath.
///
/// `#[serde(transparent)]` makes the JSON form the bare UUID string
/// (`"0b6c..."`) rather than `{ "0": "0b6c..." }`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generates a fresh random user id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identifies one client connection for its whole lifetime.
///
/// A user may reconnect and get a new `SessionId`; their `UserId` stays
/// the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generates a fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A six-digit room code such as `"482913"`.
///
/// Codes are strings on the wire. Construction goes through
/// [`RoomCode::parse`] or [`RoomCode::from_number`], so a `RoomCode`
/// value is always exactly six ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of digits in every room code.
    pub const LEN: usize = 6;

    /// Parses a code, trimming surrounding whitespace first.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim();
        if trimmed.len() == Self::LEN && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ProtocolError::InvalidMessage(format!(
                "room code must be {} digits, got {trimmed:?}",
                Self::LEN
            )))
        }
    }

    /// Builds a code from a number in `100000..=999999`.
    pub fn from_number(n: u32) -> Result<Self, ProtocolError> {
        Self::parse(&n.to_string())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// Every message type the server understands or emits.
///
/// On the wire the type is a plain string in the envelope's `type`
/// field. Incoming types are matched case-insensitively, so `"ping"` and
/// `"PING"` both parse to [`MessageType::Ping`]. Outgoing types are always
/// written in upper snake case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Hello,
    Ping,
    Pong,
    CreateRoom,
    RoomCreated,
    JoinRoom,
    JoinedRoom,
    LeaveRoom,
    LeftRoom,
    StartMatch,
    MatchStarted,
    Question,
    Answer,
    AnswerReceived,
    AnswerResult,
    ScoreUpdate,
    PlayerJoined,
    PlayerLeft,
    PlayersSnapshot,
    MatchEnded,
    Error,
}

impl MessageType {
    /// All message types, in declaration order.
    pub const ALL: [MessageType; 21] = [
        MessageType::Hello,
        MessageType::Ping,
        MessageType::Pong,
        MessageType::CreateRoom,
        MessageType::RoomCreated,
        MessageType::JoinRoom,
        MessageType::JoinedRoom,
        MessageType::LeaveRoom,
        MessageType::LeftRoom,
        MessageType::StartMatch,
        MessageType::MatchStarted,
        MessageType::Question,
        MessageType::Answer,
        MessageType::AnswerReceived,
        MessageType::AnswerResult,
        MessageType::ScoreUpdate,
        MessageType::PlayerJoined,
        MessageType::PlayerLeft,
        MessageType::PlayersSnapshot,
        MessageType::MatchEnded,
        MessageType::Error,
    ];

    /// The canonical wire spelling of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Hello => "HELLO",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::CreateRoom => "CREATE_ROOM",
            MessageType::RoomCreated => "ROOM_CREATED",
            MessageType::JoinRoom => "JOIN_ROOM",
            MessageType::JoinedRoom => "JOINED_ROOM",
            MessageType::LeaveRoom => "LEAVE_ROOM",
            MessageType::LeftRoom => "LEFT_ROOM",
            MessageType::StartMatch => "START_MATCH",
            MessageType::MatchStarted => "MATCH_STARTED",
            MessageType::Question => "QUESTION",
            MessageType::Answer => "ANSWER",
            MessageType::AnswerReceived => "ANSWER_RECEIVED",
            MessageType::AnswerResult => "ANSWER_RESULT",
            MessageType::ScoreUpdate => "SCORE_UPDATE",
            MessageType::PlayerJoined => "PLAYER_JOINED",
            MessageType::PlayerLeft => "PLAYER_LEFT",
            MessageType::PlayersSnapshot => "PLAYERS_SNAPSHOT",
            MessageType::MatchEnded => "MATCH_ENDED",
            MessageType::Error => "ERROR",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MessageType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("unknown message type: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Machine-readable codes carried in ERROR payloads.
///
/// `rename_all = "SCREAMING_SNAKE_CASE"` turns `RoomNotFound` into
/// `"ROOM_NOT_FOUND"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The envelope's `type` is not a request type.
    UnknownType,
    /// The payload is missing fields or has the wrong shape.
    InvalidPayload,
    /// JOIN_ROOM before a user id was bound by HELLO.
    Unauthenticated,
    /// The room code does not name a live room.
    RoomNotFound,
    /// The request needs a current room and the session has none.
    NotInRoom,
    /// START_MATCH by a non-owner, or on a room whose match already ran.
    ForbiddenOrInvalidState,
    /// The answer arrived outside the window, twice, or for the wrong question.
    AnswerRejected,
    /// Anything else that went wrong while handling a request.
    HandlerError,
}

impl ErrorCode {
    /// The wire spelling of this code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnknownType => "UNKNOWN_TYPE",
            ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::RoomNotFound => "ROOM_NOT_FOUND",
            ErrorCode::NotInRoom => "NOT_IN_ROOM",
            ErrorCode::ForbiddenOrInvalidState => "FORBIDDEN_OR_INVALID_STATE",
            ErrorCode::AnswerRejected => "ANSWER_REJECTED",
            ErrorCode::HandlerError => "HANDLER_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
