//! Rooms and matches for quizhub.
//!
//! This crate owns everything that happens after a session asks for a
//! room:
//!
//! - [`RoomRegistry`] creates rooms with unique six-digit codes, routes
//!   joins and leaves, and evicts rooms when they empty.
//! - [`GameRoom`] tracks members and scores and fans messages out to
//!   every member's session.
//! - [`GameLoop`] runs the timed questions of one match and decides which
//!   answers count and what they are worth.
//!
//! ```text
//! Session actor -> RoomRegistry -> GameRoom <-> GameLoop -> MatchReporter
//! ```

mod config;
mod error;
mod game_loop;
mod questions;
mod registry;
mod room;
mod scoring;

pub use config::{MatchPhase, RoomConfig};
pub use error::{AnswerRejection, RoomError};
pub use game_loop::{AnswerOutcome, AnswerTally, GameLoop, TimedAnswer};
pub use questions::{Question, QuestionSource, StaticQuestions};
pub use registry::RoomRegistry;
pub use room::GameRoom;
pub use scoring::{MAX_POINTS, MIN_POINTS, apply_delta, score_answer};
