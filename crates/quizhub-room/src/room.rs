//! A single game room: its members, their scores, and its match.
//!
//! Members are tracked in two concurrent maps. `sessions` holds one
//! [`SessionHandle`] per connected session and is what broadcasts go
//! through. `players` holds one [`PlayerState`] per user and outlives the
//! session, so a player who disconnects mid-match keeps their score.

use std::cmp::Reverse;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quizhub_protocol::payloads::{
    AnswerResultPayload, PlayerJoinedPayload, PlayerState, PlayersSnapshot, RoomCodePayload,
    ScoreUpdatePayload, UserPayload,
};
use quizhub_protocol::{AnswerRequest, Envelope, MessageType, RoomCode, SessionId, UserId};
use quizhub_report::MatchReporter;
use quizhub_session::SessionHandle;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::game_loop::GameLoop;
use crate::scoring::apply_delta;
use crate::{QuestionSource, RoomConfig, RoomError};

/// The write-once match slot.
#[derive(Default)]
struct MatchSlot {
    game: Option<Arc<GameLoop>>,
    task: Option<JoinHandle<()>>,
    started_at: Option<DateTime<Utc>>,
}

/// One room, shared as `Arc<GameRoom>` by the registry, its members'
/// sessions, and its running game loop.
pub struct GameRoom {
    code: RoomCode,
    owner: UserId,
    config: RoomConfig,
    sessions: DashMap<SessionId, SessionHandle>,
    players: DashMap<UserId, PlayerState>,
    slot: Mutex<MatchSlot>,
    questions: Arc<dyn QuestionSource>,
    reporter: Arc<dyn MatchReporter>,
}

impl std::fmt::Debug for GameRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameRoom")
            .field("code", &self.code)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl GameRoom {
    pub(crate) fn new(
        code: RoomCode,
        owner: UserId,
        config: RoomConfig,
        questions: Arc<dyn QuestionSource>,
        reporter: Arc<dyn MatchReporter>,
    ) -> Self {
        Self {
            code,
            owner,
            config,
            sessions: DashMap::new(),
            players: DashMap::new(),
            slot: Mutex::new(MatchSlot::default()),
            questions,
            reporter,
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, MatchSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub(crate) fn reporter(&self) -> Arc<dyn MatchReporter> {
        Arc::clone(&self.reporter)
    }

    /// A room with no connected sessions is evicted by the registry.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn player(&self, user: &UserId) -> Option<PlayerState> {
        self.players.get(user).map(|p| p.clone())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Adds a session, marking its user online and not yet answered.
    ///
    /// Everyone (the newcomer included) gets `PLAYER_JOINED`; the newcomer
    /// also gets a private snapshot before the room-wide one.
    pub fn add_player(&self, session: SessionHandle) {
        let user_id = session.user_id();
        let session_id = session.id();

        self.players
            .entry(user_id)
            .and_modify(|p| {
                p.online = true;
                p.has_answered = false;
            })
            .or_insert_with(|| PlayerState::new(user_id));
        self.sessions.insert(session_id, session.clone());
        tracing::info!(room = %self.code, user = %user_id, session = %session_id, "player joined");

        self.broadcast_message(
            MessageType::PlayerJoined,
            &PlayerJoinedPayload {
                user_id,
                session_id,
            },
        );
        if let Some(snapshot) = self.snapshot_envelope() {
            if let Err(e) = session.send(snapshot.clone()) {
                tracing::debug!(room = %self.code, error = %e, "snapshot to new member failed");
            }
            self.broadcast(snapshot);
        }
    }

    /// Removes a session. Returns `false` if it was not a member.
    ///
    /// The player's entry stays (offline, not answered) so their score
    /// survives into the match results.
    pub fn remove_player(&self, session: SessionId) -> bool {
        let Some((_, handle)) = self.sessions.remove(&session) else {
            return false;
        };
        let user_id = handle.user_id();

        let still_connected = self.sessions.iter().any(|s| s.user_id() == user_id);
        if !still_connected {
            if let Some(mut player) = self.players.get_mut(&user_id) {
                player.online = false;
                player.has_answered = false;
            }
        }
        tracing::info!(room = %self.code, user = %user_id, session = %session, "player left");

        self.broadcast_message(MessageType::PlayerLeft, &UserPayload { user_id });
        self.broadcast_snapshot();
        true
    }

    // -----------------------------------------------------------------------
    // Match
    // -----------------------------------------------------------------------

    /// Starts the room's one and only match.
    ///
    /// Only the owner may start it, and only once. The requester gets
    /// `MATCH_STARTED` (tagged with `request_id`) before the loop is
    /// spawned, so it always precedes the first question.
    pub fn start_match(
        self: &Arc<Self>,
        requester: &SessionHandle,
        request_id: Option<String>,
    ) -> Result<(), RoomError> {
        if requester.user_id() != self.owner {
            return Err(RoomError::Forbidden("only the room owner can start the match"));
        }

        let mut slot = self.lock_slot();
        if slot.game.is_some() {
            return Err(RoomError::Forbidden("the match has already been started"));
        }

        let game = Arc::new(GameLoop::new(
            self.questions.questions(),
            self.config.question_window,
        ));
        slot.game = Some(Arc::clone(&game));
        slot.started_at = Some(Utc::now());

        if let Some(ack) = encode(
            MessageType::MatchStarted,
            &RoomCodePayload {
                room_code: self.code.clone(),
            },
        ) {
            let _ = requester.send(ack.with_request_id(request_id));
        }
        slot.task = Some(tokio::spawn(game.run(Arc::clone(self))));
        Ok(())
    }

    /// Scores an answer from `session` and tells the room about it.
    pub fn submit_answer(
        &self,
        session: SessionId,
        answer: &AnswerRequest,
    ) -> Result<AnswerResultPayload, RoomError> {
        let handle = self
            .sessions
            .get(&session)
            .map(|h| h.clone())
            .ok_or(RoomError::NotInRoom(session))?;
        let user_id = handle.user_id();

        let game = self
            .lock_slot()
            .game
            .clone()
            .ok_or(crate::AnswerRejection::NoQuestionOpen)?;
        // The flag is set under the loop lock, so it cannot land after the
        // next question's reset. The map guard is dropped before any
        // broadcast walks `players`.
        let (outcome, total_score) =
            game.receive_answer_with(user_id, answer, |outcome| {
                match self.players.get_mut(&user_id) {
                    Some(mut player) => {
                        player.has_answered = true;
                        player.score = apply_delta(player.score, outcome.delta);
                        player.score
                    }
                    None => apply_delta(0, outcome.delta),
                }
            })?;
        tracing::debug!(
            room = %self.code,
            user = %user_id,
            question = %outcome.question_id,
            delta = outcome.delta,
            "answer accepted"
        );

        self.broadcast_message(MessageType::AnswerReceived, &UserPayload { user_id });
        self.broadcast_message(
            MessageType::ScoreUpdate,
            &ScoreUpdatePayload {
                user_id,
                delta: outcome.delta,
                total_score,
            },
        );
        let result = AnswerResultPayload {
            question_id: outcome.question_id,
            is_correct: outcome.is_correct,
            delta: outcome.delta,
            total_score,
        };
        if let Some(env) = encode(MessageType::AnswerResult, &result) {
            let _ = handle.send(env);
        }
        self.broadcast_snapshot();
        Ok(result)
    }

    /// Clears `has_answered` for every online player.
    pub(crate) fn reset_answered(&self) {
        for mut player in self.players.iter_mut() {
            if player.online {
                player.has_answered = false;
            }
        }
    }

    /// Returns `(started_at, ended_at)`, ending now.
    pub(crate) fn match_span(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let ended_at = Utc::now();
        let started_at = self.lock_slot().started_at.unwrap_or(ended_at);
        (started_at, ended_at)
    }

    /// Aborts a running match task, if any.
    pub fn abort_match(&self) {
        if let Some(task) = self.lock_slot().task.take() {
            if !task.is_finished() {
                tracing::info!(room = %self.code, "aborting running match");
            }
            task.abort();
        }
    }

    // -----------------------------------------------------------------------
    // Broadcasting
    // -----------------------------------------------------------------------

    /// Every player, highest score first, ties by user id.
    pub fn snapshot(&self) -> Vec<PlayerState> {
        let mut players: Vec<PlayerState> = self.players.iter().map(|p| p.clone()).collect();
        players.sort_by_key(|p| (Reverse(p.score), p.user_id));
        players
    }

    fn snapshot_envelope(&self) -> Option<Envelope> {
        encode(
            MessageType::PlayersSnapshot,
            &PlayersSnapshot {
                room_code: self.code.clone(),
                players: self.snapshot(),
            },
        )
    }

    pub(crate) fn broadcast_snapshot(&self) {
        if let Some(env) = self.snapshot_envelope() {
            self.broadcast(env);
        }
    }

    pub(crate) fn broadcast_message<T: Serialize>(&self, kind: MessageType, payload: &T) {
        if let Some(env) = encode(kind, payload) {
            self.broadcast(env);
        }
    }

    /// Sends to every connected session. A closed session is skipped.
    pub fn broadcast(&self, envelope: Envelope) {
        for session in self.sessions.iter() {
            if let Err(e) = session.send(envelope.clone()) {
                tracing::debug!(room = %self.code, error = %e, "broadcast to session failed");
            }
        }
    }
}

fn encode<T: Serialize>(kind: MessageType, payload: &T) -> Option<Envelope> {
    match Envelope::new(kind, payload) {
        Ok(env) => Some(env),
        Err(e) => {
            tracing::warn!(%kind, error = %e, "failed to encode outgoing message");
            None
        }
    }
}
