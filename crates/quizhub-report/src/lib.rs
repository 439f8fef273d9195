//! Match result reporting for quizhub.
//!
//! When a match ends, the game loop hands a [`MatchReport`] to a
//! [`MatchReporter`] on a task of its own. Reporting is fire-and-forget
//! from the loop's point of view: `report` never returns an error and
//! never panics, it retries and logs instead.
//!
//! Two reporters ship with the crate:
//!
//! - [`HttpMatchReporter`]: POSTs the report to the record-keeping
//!   service with a shared-secret header, retrying with backoff.
//! - [`NoopReporter`]: drops reports; used when no endpoint is configured.

mod error;
mod http;

pub use error::ReportError;
pub use http::{HttpMatchReporter, REPORT_KEY_HEADER, REPORT_PATH, ReportConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quizhub_protocol::RoomCode;
use quizhub_protocol::payloads::PlayerResult;
use serde::{Deserialize, Serialize};

/// Final results of one completed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub room_code: RoomCode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub players: Vec<PlayerResult>,
}

/// Delivers match reports somewhere.
///
/// Object-safe through `async_trait` so rooms can hold an
/// `Arc<dyn MatchReporter>` chosen at startup.
#[async_trait]
pub trait MatchReporter: Send + Sync + 'static {
    /// Delivers `report`, handling every failure internally.
    async fn report(&self, report: MatchReport);
}

/// A reporter that logs and drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

#[async_trait]
impl MatchReporter for NoopReporter {
    async fn report(&self, report: MatchReport) {
        tracing::debug!(room = %report.room_code, "no report endpoint configured, dropping match report");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizhub_protocol::UserId;

    #[test]
    fn test_match_report_serializes_camel_case() {
        let now = Utc::now();
        let report = MatchReport {
            room_code: RoomCode::parse("123456").unwrap(),
            started_at: now,
            ended_at: now,
            players: vec![PlayerResult {
                user_id: UserId::new(),
                score: 90,
                correct_answers: 1,
                total_answers: 2,
            }],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["roomCode"], "123456");
        assert!(value.get("startedAt").is_some());
        assert_eq!(value["players"][0]["correctAnswers"], 1);
        assert_eq!(value["players"][0]["totalAnswers"], 2);
    }

    #[tokio::test]
    async fn test_noop_reporter_completes() {
        let now = Utc::now();
        NoopReporter
            .report(MatchReport {
                room_code: RoomCode::parse("654321").unwrap(),
                started_at: now,
                ended_at: now,
                players: Vec::new(),
            })
            .await;
    }
}
