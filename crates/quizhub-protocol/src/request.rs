//! Typed client requests.
//!
//! The envelope keeps the payload as raw JSON. [`ClientRequest::decode`]
//! turns an envelope into a closed enum with one variant per request the
//! server handles, so the dispatcher can `match` exhaustively instead of
//! comparing strings.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{Envelope, ErrorCode, MessageType, UserId};

/// A request sent by a client, decoded from an [`Envelope`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Hello(HelloRequest),
    Ping,
    CreateRoom,
    JoinRoom(JoinRoomRequest),
    LeaveRoom,
    StartMatch,
    Answer(AnswerRequest),
}

/// Payload of `HELLO`. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloRequest {
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Payload of `JOIN_ROOM`.
///
/// The code stays a plain string here: a well-formed payload whose code
/// names no room is `ROOM_NOT_FOUND`, not `INVALID_PAYLOAD`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_code: String,
}

/// Payload of `ANSWER`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: String,
    pub selected_option_index: usize,
}

/// Why an envelope could not become a [`ClientRequest`].
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The type is unknown, or is a server-to-client type.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The type is known but the payload does not fit it.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: MessageType, reason: String },
}

impl RequestError {
    /// The error code reported back to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            RequestError::UnknownType(_) => ErrorCode::UnknownType,
            RequestError::InvalidPayload { .. } => ErrorCode::InvalidPayload,
        }
    }
}

impl ClientRequest {
    /// Decodes an envelope into a typed request.
    pub fn decode(envelope: &Envelope) -> Result<Self, RequestError> {
        let kind = envelope
            .kind()
            .ok_or_else(|| RequestError::UnknownType(envelope.msg_type().to_string()))?;

        match kind {
            MessageType::Hello => Ok(ClientRequest::Hello(optional_payload(envelope, kind)?)),
            MessageType::Ping => Ok(ClientRequest::Ping),
            MessageType::CreateRoom => Ok(ClientRequest::CreateRoom),
            MessageType::JoinRoom => {
                let req: JoinRoomRequest = required_payload(envelope, kind)?;
                if req.room_code.trim().is_empty() {
                    return Err(RequestError::InvalidPayload {
                        kind,
                        reason: "roomCode must not be blank".into(),
                    });
                }
                Ok(ClientRequest::JoinRoom(req))
            }
            MessageType::LeaveRoom => Ok(ClientRequest::LeaveRoom),
            MessageType::StartMatch => Ok(ClientRequest::StartMatch),
            MessageType::Answer => Ok(ClientRequest::Answer(required_payload(envelope, kind)?)),
            other => Err(RequestError::UnknownType(other.as_str().to_string())),
        }
    }

    /// The message type this request was decoded from.
    pub fn kind(&self) -> MessageType {
        match self {
            ClientRequest::Hello(_) => MessageType::Hello,
            ClientRequest::Ping => MessageType::Ping,
            ClientRequest::CreateRoom => MessageType::CreateRoom,
            ClientRequest::JoinRoom(_) => MessageType::JoinRoom,
            ClientRequest::LeaveRoom => MessageType::LeaveRoom,
            ClientRequest::StartMatch => MessageType::StartMatch,
            ClientRequest::Answer(_) => MessageType::Answer,
        }
    }
}

fn required_payload<T: DeserializeOwned>(
    envelope: &Envelope,
    kind: MessageType,
) -> Result<T, RequestError> {
    envelope
        .payload_as()
        .map_err(|e| RequestError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
}

fn optional_payload<T: DeserializeOwned + Default>(
    envelope: &Envelope,
    kind: MessageType,
) -> Result<T, RequestError> {
    if envelope.payload().is_null() {
        return Ok(T::default());
    }
    required_payload(envelope, kind)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
