//! Wire protocol for quizhub.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Envelope** ([`Envelope`]): the `{ type, requestId, payload }`
//!   wrapper around every message.
//! - **Registry** ([`MessageType`], [`ErrorCode`]): the closed sets of
//!   message types and error codes.
//! - **Requests** ([`ClientRequest`]): typed decoding of what clients send.
//! - **Payloads** ([`payloads`]): the structures the server sends back.
//! - **Framing** ([`encode_line`], [`LineDecoder`]): one JSON value per
//!   `\n`-terminated line.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! (a user's connection). It knows nothing about sockets or rooms; it
//! only knows how messages look and how they are framed.
//!
//! ```text
//! Transport (bytes) -> LineDecoder (Envelope) -> ClientRequest -> session
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod envelope;
mod error;
mod request;
mod types;

pub mod payloads;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{LineDecoder, MAX_LINE_BYTES, encode_line};
pub use envelope::Envelope;
pub use error::ProtocolError;
pub use request::{AnswerRequest, ClientRequest, HelloRequest, JoinRoomRequest, RequestError};
pub use types::{ErrorCode, MessageType, RoomCode, SessionId, UserId};
