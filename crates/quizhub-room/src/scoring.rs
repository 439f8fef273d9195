//! Points for an answer.

use std::time::Duration;

/// Points for an instant correct answer.
pub const MAX_POINTS: i32 = 100;

/// Floor for a correct answer, however late.
pub const MIN_POINTS: i32 = 10;

/// Score delta for one answer.
///
/// Wrong answers score 0. Correct answers lose one point per full 100 ms
/// since the question opened, clamped to `MIN_POINTS..=MAX_POINTS`.
pub fn score_answer(correct: bool, elapsed: Duration) -> i32 {
    if !correct {
        return 0;
    }
    let penalty = i32::try_from(elapsed.as_millis() / 100).unwrap_or(i32::MAX);
    MAX_POINTS.saturating_sub(penalty).clamp(MIN_POINTS, MAX_POINTS)
}

/// Adds `delta` to `score`, never going below zero.
pub fn apply_delta(score: u32, delta: i32) -> u32 {
    let total = i64::from(score) + i64::from(delta);
    u32::try_from(total.max(0)).unwrap_or(u32::MAX)
}
