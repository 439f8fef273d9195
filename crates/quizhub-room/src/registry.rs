//! Room registry: creates, tracks, and evicts rooms.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use quizhub_protocol::payloads::AnswerResultPayload;
use quizhub_protocol::{AnswerRequest, RoomCode, SessionId};
use quizhub_report::MatchReporter;
use quizhub_session::SessionHandle;
use rand::Rng;

use crate::{GameRoom, QuestionSource, RoomConfig, RoomError};

/// Lowest and highest six-digit room codes.
const CODE_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// All live rooms, keyed by code.
///
/// The registry is an ordinary value: the server builds one and shares
/// it as `Arc<RoomRegistry>`, and each test builds its own.
pub struct RoomRegistry {
    rooms: DashMap<RoomCode, Arc<GameRoom>>,
    config: RoomConfig,
    questions: Arc<dyn QuestionSource>,
    reporter: Arc<dyn MatchReporter>,
}

impl RoomRegistry {
    pub fn new(
        config: RoomConfig,
        questions: Arc<dyn QuestionSource>,
        reporter: Arc<dyn MatchReporter>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
            questions,
            reporter,
        }
    }

    /// Creates a room owned by `owner`'s user, with `owner` already in it.
    ///
    /// The owner is added while the code's map slot is still held, so a
    /// fresh room is never visible while empty.
    pub fn create_room(&self, owner: SessionHandle) -> Result<Arc<GameRoom>, RoomError> {
        let attempts = self.config.max_code_attempts;
        let mut rng = rand::rng();

        for _ in 0..attempts {
            let Ok(code) = RoomCode::from_number(rng.random_range(CODE_RANGE)) else {
                continue;
            };
            match self.rooms.entry(code.clone()) {
                Entry::Occupied(_) => {
                    tracing::debug!(%code, "room code collision, retrying");
                }
                Entry::Vacant(slot) => {
                    let room = Arc::new(GameRoom::new(
                        code.clone(),
                        owner.user_id(),
                        self.config.clone(),
                        Arc::clone(&self.questions),
                        Arc::clone(&self.reporter),
                    ));
                    tracing::info!(%code, owner = %owner.user_id(), "room created");
                    room.add_player(owner);
                    slot.insert(Arc::clone(&room));
                    return Ok(room);
                }
            }
        }

        tracing::warn!(attempts, "no free room code");
        Err(RoomError::CodeSpaceExhausted { attempts })
    }

    /// Adds `session` to the room named by `code`.
    ///
    /// The map entry stays read-locked while the player is added, so this
    /// cannot interleave with eviction: a join either lands in a live
    /// room or fails with `NotFound`.
    pub fn join_room(
        &self,
        code: &RoomCode,
        session: SessionHandle,
    ) -> Result<Arc<GameRoom>, RoomError> {
        let room = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        room.add_player(session);
        Ok(Arc::clone(room.value()))
    }

    /// Removes `session` from the room, evicting the room if that left it
    /// empty. Unknown rooms and non-members are a no-op.
    pub fn leave_room(&self, code: &RoomCode, session: SessionId) -> bool {
        let Some(room) = self.room(code) else {
            return false;
        };
        let removed = room.remove_player(session);

        if self.rooms.remove_if(code, |_, room| room.is_empty()).is_some() {
            tracing::info!(%code, "empty room evicted");
        }
        removed
    }

    /// Starts the match in the room named by `code`.
    pub fn start_match(
        &self,
        code: &RoomCode,
        requester: &SessionHandle,
        request_id: Option<String>,
    ) -> Result<(), RoomError> {
        let room = self
            .room(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        room.start_match(requester, request_id)
    }

    /// Submits an answer on behalf of `session`.
    pub fn submit_answer(
        &self,
        code: &RoomCode,
        session: SessionId,
        answer: &AnswerRequest,
    ) -> Result<AnswerResultPayload, RoomError> {
        let room = self
            .room(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        room.submit_answer(session, answer)
    }

    /// Looks up a live room.
    pub fn room(&self, code: &RoomCode) -> Option<Arc<GameRoom>> {
        self.rooms.get(code).map(|r| Arc::clone(r.value()))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Aborts every running match and forgets all rooms.
    ///
    /// Only for process shutdown.
    pub fn shutdown(&self) {
        let rooms: Vec<Arc<GameRoom>> = self.rooms.iter().map(|r| Arc::clone(r.value())).collect();
        for room in &rooms {
            room.abort_match();
        }
        self.rooms.clear();
        tracing::info!(rooms = rooms.len(), "room registry shut down");
    }
}
