//! The envelope: the outer shape of every message on the wire.
//!
//! ```text
//! {"type":"JOIN_ROOM","requestId":"r-7","payload":{"roomCode":"123456"}}
//! ```
//!
//! The envelope deliberately keeps `type` as a string and `payload` as raw
//! JSON. Unknown types must still parse (so the server can answer
//! `UNKNOWN_TYPE` with the right `requestId`), which rules out decoding
//! straight into a closed enum. Typed decoding happens one layer up, in
//! [`ClientRequest::decode`](crate::ClientRequest::decode).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payloads::ErrorPayload;
use crate::{ErrorCode, MessageType, ProtocolError};

/// A single protocol message.
///
/// Fields are private so every `Envelope` in memory satisfies the one
/// invariant the wire format has: `type` is never empty. Deserialization
/// enforces it through `try_from = "RawEnvelope"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawEnvelope")]
pub struct Envelope {
    #[serde(rename = "type")]
    msg_type: String,
    request_id: Option<String>,
    payload: Value,
}

/// The unchecked shape serde reads before validation.
///
/// `requestId` and `payload` may be missing entirely; both default.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = ProtocolError;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        Envelope::from_parts(raw.msg_type, raw.request_id, raw.payload)
    }
}

impl Envelope {
    /// Builds an envelope of a known type from any serializable payload.
    pub fn new<T: Serialize>(kind: MessageType, payload: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Self {
            msg_type: kind.as_str().to_string(),
            request_id: None,
            payload,
        })
    }

    /// Builds an envelope from raw parts.
    ///
    /// This is how envelopes with types outside [`MessageType`] are made,
    /// such as gateway notices or deliberately bogus test requests. The
    /// type is trimmed and must not be empty.
    pub fn from_parts(
        msg_type: impl Into<String>,
        request_id: Option<String>,
        payload: Value,
    ) -> Result<Self, ProtocolError> {
        let msg_type = msg_type.into();
        let trimmed = msg_type.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "envelope type must not be empty".into(),
            ));
        }
        Ok(Self {
            msg_type: trimmed.to_string(),
            request_id,
            payload,
        })
    }

    /// Builds an `ERROR` envelope with `{ code, message }` as payload.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            msg_type: MessageType::Error.as_str().to_string(),
            request_id: None,
            // Cannot fail: a unit enum and a string.
            payload: serde_json::to_value(ErrorPayload {
                code,
                message: message.into(),
            })
            .unwrap_or_default(),
        }
    }

    /// Attaches (or clears) the request id this envelope answers.
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// The raw type string, exactly as received or built.
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// The parsed message type, or `None` if the type is not one the
    /// server knows.
    pub fn kind(&self) -> Option<MessageType> {
        self.msg_type.parse().ok()
    }

    /// The correlation id supplied by the client, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The raw payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Decodes the payload into `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.payload).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
