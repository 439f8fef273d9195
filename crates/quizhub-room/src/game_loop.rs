//! The authoritative timed-question loop.
//!
//! One `GameLoop` runs one match. It walks the question list, opening
//! each question for a fixed window, and owns the per-question answer
//! state that decides which answers count.
//!
//! Answer state lives behind a `std::sync::Mutex`: the check "has this
//! user answered?" and the write "this user answered" happen under one
//! lock, so two racing answers from the same user cannot both score.
//! The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use quizhub_protocol::payloads::{MatchEndedPayload, PlayerResult};
use quizhub_protocol::{AnswerRequest, MessageType, UserId};
use quizhub_report::MatchReport;
use tokio::time::Instant;

use crate::room::GameRoom;
use crate::scoring::score_answer;
use crate::{AnswerRejection, MatchPhase, Question};

/// An accepted answer and when it arrived.
#[derive(Debug, Clone, Copy)]
pub struct TimedAnswer {
    pub selected_option_index: usize,
    pub received_at: Instant,
}

/// How many answers a user gave over the match, and how many were right.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnswerTally {
    pub correct: u32,
    pub total: u32,
}

/// What an accepted answer was worth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub question_id: String,
    pub is_correct: bool,
    pub delta: i32,
}

#[derive(Debug)]
struct LoopState {
    phase: MatchPhase,
    opened_at: Option<Instant>,
    answers: HashMap<UserId, TimedAnswer>,
    tallies: HashMap<UserId, AnswerTally>,
}

/// A single-use match runner.
#[derive(Debug)]
pub struct GameLoop {
    questions: Vec<Question>,
    window: Duration,
    state: Mutex<LoopState>,
}

impl GameLoop {
    pub fn new(questions: Vec<Question>, window: Duration) -> Self {
        Self {
            questions,
            window,
            state: Mutex::new(LoopState {
                phase: MatchPhase::NotStarted,
                opened_at: None,
                answers: HashMap::new(),
                tallies: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> MatchPhase {
        self.lock().phase
    }

    /// Advances to the next question and opens it.
    ///
    /// Returns `None` (and leaves the loop `Ended`) once the list is done.
    pub(crate) fn open_next(&self) -> Option<Question> {
        let mut state = self.lock();
        state.phase = state.phase.advance(self.questions.len());
        let index = state.phase.question_index()?;
        state.opened_at = Some(Instant::now());
        state.answers.clear();
        self.questions.get(index).cloned()
    }

    /// Closes the current question and ends the match.
    pub(crate) fn finish(&self) {
        let mut state = self.lock();
        state.phase = MatchPhase::Ended;
        state.opened_at = None;
    }

    /// Checks and records an answer in one step.
    pub fn receive_answer(
        &self,
        user: UserId,
        answer: &AnswerRequest,
    ) -> Result<AnswerOutcome, AnswerRejection> {
        self.receive_answer_with(user, answer, |_| ())
            .map(|(outcome, ())| outcome)
    }

    /// Like [`receive_answer`](Self::receive_answer), but runs `on_accept`
    /// before the loop lock is released.
    ///
    /// While `on_accept` runs the answered question is still the open one,
    /// so per-question state it writes cannot leak into the next question.
    /// `on_accept` must not call back into this loop.
    pub(crate) fn receive_answer_with<R>(
        &self,
        user: UserId,
        answer: &AnswerRequest,
        on_accept: impl FnOnce(&AnswerOutcome) -> R,
    ) -> Result<(AnswerOutcome, R), AnswerRejection> {
        let received_at = Instant::now();
        let mut state = self.lock();

        let question = state
            .phase
            .question_index()
            .and_then(|i| self.questions.get(i))
            .ok_or(AnswerRejection::NoQuestionOpen)?;
        if question.id != answer.question_id {
            return Err(AnswerRejection::WrongQuestion {
                open: question.id.clone(),
                got: answer.question_id.clone(),
            });
        }
        if state.answers.contains_key(&user) {
            return Err(AnswerRejection::AlreadyAnswered);
        }

        state.answers.insert(
            user,
            TimedAnswer {
                selected_option_index: answer.selected_option_index,
                received_at,
            },
        );

        let opened_at = state.opened_at.unwrap_or(received_at);
        let is_correct = question.is_correct(answer.selected_option_index);
        let delta = score_answer(is_correct, received_at.saturating_duration_since(opened_at));

        let tally = state.tallies.entry(user).or_default();
        tally.total += 1;
        if is_correct {
            tally.correct += 1;
        }

        let outcome = AnswerOutcome {
            question_id: question.id.clone(),
            is_correct,
            delta,
        };
        let accepted = on_accept(&outcome);
        Ok((outcome, accepted))
    }

    /// Per-user answer counts so far.
    pub fn tallies(&self) -> HashMap<UserId, AnswerTally> {
        self.lock().tallies.clone()
    }

    /// Runs the match to completion against `room`.
    pub(crate) async fn run(self: Arc<Self>, room: Arc<GameRoom>) {
        tracing::info!(
            room = %room.code(),
            questions = self.questions.len(),
            "match started"
        );

        for _ in 0..self.questions.len() {
            let Some(question) = self.open_next() else {
                break;
            };
            // After the open: a late flag for the previous question is
            // already set by now and gets cleared here.
            room.reset_answered();
            room.broadcast_snapshot();
            room.broadcast_message(MessageType::Question, &question.to_public());
            tracing::debug!(room = %room.code(), question = %question.id, "question opened");
            tokio::time::sleep(self.window).await;
        }
        self.finish();

        let (started_at, ended_at) = room.match_span();
        let tallies = self.tallies();
        let results: Vec<PlayerResult> = room
            .snapshot()
            .into_iter()
            .map(|player| {
                let tally = tallies.get(&player.user_id).copied().unwrap_or_default();
                PlayerResult {
                    user_id: player.user_id,
                    score: player.score,
                    correct_answers: tally.correct,
                    total_answers: tally.total,
                }
            })
            .collect();

        room.broadcast_message(
            MessageType::MatchEnded,
            &MatchEndedPayload {
                room_code: room.code().clone(),
                results: results.clone(),
            },
        );
        tracing::info!(room = %room.code(), players = results.len(), "match ended");

        let report = MatchReport {
            room_code: room.code().clone(),
            started_at,
            ended_at,
            players: results,
        };
        let reporter = room.reporter();
        tokio::spawn(async move { reporter.report(report).await });
    }
}
