//! Integration tests for the HTTP reporter against an in-process axum
//! server standing in for the record-keeping service.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use chrono::Utc;
use quizhub_protocol::payloads::PlayerResult;
use quizhub_protocol::{RoomCode, UserId};
use quizhub_report::{HttpMatchReporter, MatchReport, MatchReporter, ReportConfig};
use serde_json::Value;

/// What the fake endpoint saw, and how many requests it should fail.
#[derive(Default)]
struct Fake {
    fail_first: usize,
    calls: Mutex<Vec<(Option<String>, Value)>>,
}

async fn handle(
    State(fake): State<Arc<Fake>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> StatusCode {
    let key = headers
        .get("x-internal-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut calls = fake.calls.lock().unwrap();
    calls.push((key, body));
    if calls.len() <= fake.fail_first {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

/// Starts the fake endpoint and returns its base URL.
async fn start_fake(fake: Arc<Fake>) -> String {
    let app = Router::new()
        .route("/internal/matches/report", post(handle))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake server");
    });
    format!("http://{addr}")
}

fn reporter(base_url: &str) -> HttpMatchReporter {
    let mut config = ReportConfig::new(base_url, "secret-key");
    config.base_delay = Duration::from_millis(10);
    config.request_timeout = Duration::from_secs(2);
    HttpMatchReporter::new(config).expect("client")
}

fn sample_report() -> MatchReport {
    let now = Utc::now();
    MatchReport {
        room_code: RoomCode::parse("424242").unwrap(),
        started_at: now,
        ended_at: now,
        players: vec![PlayerResult {
            user_id: UserId::new(),
            score: 100,
            correct_answers: 1,
            total_answers: 1,
        }],
    }
}

#[tokio::test]
async fn test_report_delivers_with_key_header_on_first_try() {
    let fake = Arc::new(Fake::default());
    let base = start_fake(Arc::clone(&fake)).await;

    reporter(&base).report(sample_report()).await;

    let calls = fake.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.as_deref(), Some("secret-key"));
    assert_eq!(calls[0].1["roomCode"], "424242");
    assert_eq!(calls[0].1["players"][0]["score"], 100);
}

#[tokio::test]
async fn test_report_retries_until_success() {
    let fake = Arc::new(Fake {
        fail_first: 2,
        ..Fake::default()
    });
    let base = start_fake(Arc::clone(&fake)).await;

    reporter(&base).report(sample_report()).await;

    assert_eq!(fake.calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_report_gives_up_after_max_attempts() {
    let fake = Arc::new(Fake {
        fail_first: usize::MAX,
        ..Fake::default()
    });
    let base = start_fake(Arc::clone(&fake)).await;

    reporter(&base).report(sample_report()).await;

    assert_eq!(fake.calls.lock().unwrap().len(), 3, "exactly three attempts");
}

#[tokio::test]
async fn test_send_once_surfaces_status_error() {
    let fake = Arc::new(Fake {
        fail_first: 1,
        ..Fake::default()
    });
    let base = start_fake(Arc::clone(&fake)).await;

    let err = reporter(&base)
        .send_once(&sample_report())
        .await
        .expect_err("first call fails");
    assert!(matches!(
        err,
        quizhub_report::ReportError::Status { status: 500, .. }
    ));
}

#[tokio::test]
async fn test_report_to_unreachable_endpoint_returns_quietly() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    reporter(&format!("http://{addr}"))
        .report(sample_report())
        .await;
}
