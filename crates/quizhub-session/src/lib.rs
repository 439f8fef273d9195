//! Per-connection session state for quizhub.
//!
//! A session is one client connection. This crate holds the two views of
//! it that the rest of the server needs:
//!
//! 1. **[`SessionState`]**: the mutable record owned by the connection's
//!    task (bound user, current room).
//! 2. **[`SessionHandle`]**: a cloneable sender rooms use to push
//!    envelopes to the session without touching its socket.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     <- holds SessionHandles, broadcasts through them
//!     |
//! Session Layer (this)   <- identity binding and room membership
//!     |
//! Protocol Layer (below) <- provides UserId, SessionId, Envelope
//! ```

mod error;
mod session;

pub use error::SessionError;
pub use session::{SessionHandle, SessionState};
