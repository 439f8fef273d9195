//! Error types for the protocol layer.
//!
//! Each crate in quizhub defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in serialization or framing,
//! not in networking or room management.

/// Errors that can occur in the protocol layer.
///
/// `#[derive(thiserror::Error)]` generates the `std::error::Error`
/// implementation. The `#[error("...")]` attributes define the message
/// you see when the error is printed or logged.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning JSON into a Rust value).
    ///
    /// Common causes: malformed JSON, missing required fields, or a
    /// value of the wrong type.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message parsed as JSON but breaks a protocol rule, such as an
    /// envelope with an empty `type`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
