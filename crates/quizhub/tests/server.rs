//! Integration tests for the quiz server: real TCP clients against a
//! server bound to a random loopback port.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quizhub::prelude::*;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Notify, oneshot};

/// Short enough to keep a two-question match around a second.
const WINDOW: Duration = Duration::from_millis(600);

/// Upper bound on any single wait in these tests.
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

// =========================================================================
// Recording reporter
// =========================================================================

#[derive(Default)]
struct RecordingReporter {
    reports: Mutex<Vec<MatchReport>>,
    delivered: Notify,
}

#[async_trait]
impl MatchReporter for RecordingReporter {
    async fn report(&self, report: MatchReport) {
        self.reports.lock().unwrap().push(report);
        self.delivered.notify_one();
    }
}

impl RecordingReporter {
    async fn wait_for_report(&self) -> MatchReport {
        loop {
            if let Some(report) = self.reports.lock().unwrap().first().cloned() {
                return report;
            }
            tokio::time::timeout(STEP_TIMEOUT, self.delivered.notified())
                .await
                .expect("report should be delivered");
        }
    }

    fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

// =========================================================================
// Helpers
// =========================================================================

struct TestServer {
    addr: String,
    registry: Arc<RoomRegistry>,
    reporter: Arc<RecordingReporter>,
}

/// Starts a server on a random port with a short question window.
async fn start_server() -> TestServer {
    let reporter = Arc::new(RecordingReporter::default());
    let server = QuizServer::builder()
        .bind("127.0.0.1:0")
        .room_config(RoomConfig {
            question_window: WINDOW,
            ..RoomConfig::default()
        })
        .reporter(reporter.clone())
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let registry = server.registry();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    TestServer {
        addr,
        registry,
        reporter,
    }
}

/// A line-protocol client that keeps skipped messages around.
struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    backlog: VecDeque<Value>,
    next_request: u32,
}

impl Client {
    /// Connects and consumes the server's greeting.
    async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            lines: BufReader::new(reader).lines(),
            writer,
            backlog: VecDeque::new(),
            next_request: 0,
        };
        let greeting = client.expect_type("HELLO").await;
        assert_eq!(greeting["payload"]["message"], "Welcome to Quiz Server");
        client
    }

    /// Connects and says HELLO as `user`.
    async fn connect_as(addr: &str, user: UserId) -> Self {
        let mut client = Self::connect(addr).await;
        let ack = client
            .request("HELLO", json!({ "userId": user.to_string() }))
            .await;
        assert_eq!(ack["payload"]["message"], "HELLO_ACK");
        client
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("send");
    }

    /// Sends a request and returns the reply carrying its request id.
    async fn request(&mut self, msg_type: &str, payload: Value) -> Value {
        self.next_request += 1;
        let request_id = format!("req-{}", self.next_request);
        let line = json!({ "type": msg_type, "requestId": request_id, "payload": payload });
        self.send_raw(&line.to_string()).await;
        self.reply_to(&request_id).await
    }

    /// Reads the next message off the socket. `None` on EOF.
    async fn read(&mut self) -> Option<Value> {
        let line = tokio::time::timeout(STEP_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a message")
            .expect("read line")?;
        Some(serde_json::from_str(&line).expect("server sent invalid JSON"))
    }

    /// Finds the reply to `request_id`, keeping everything else queued.
    async fn reply_to(&mut self, request_id: &str) -> Value {
        if let Some(pos) = self
            .backlog
            .iter()
            .position(|m| m["requestId"] == request_id)
        {
            return self.backlog.remove(pos).unwrap();
        }
        loop {
            let msg = self.read().await.expect("connection closed");
            if msg["requestId"] == request_id {
                return msg;
            }
            self.backlog.push_back(msg);
        }
    }

    /// Discards messages until one of type `msg_type` arrives.
    async fn expect_type(&mut self, msg_type: &str) -> Value {
        while let Some(msg) = self.backlog.pop_front() {
            if msg["type"] == msg_type {
                return msg;
            }
        }
        loop {
            let msg = self.read().await.expect("connection closed");
            if msg["type"] == msg_type {
                return msg;
            }
        }
    }

    async fn create_room(&mut self) -> String {
        let created = self.request("CREATE_ROOM", Value::Null).await;
        assert_eq!(created["type"], "ROOM_CREATED");
        created["payload"]["roomCode"]
            .as_str()
            .expect("roomCode")
            .to_string()
    }
}

fn error_code(msg: &Value) -> &str {
    assert_eq!(msg["type"], "ERROR", "expected ERROR, got {msg}");
    msg["payload"]["code"].as_str().expect("code")
}

fn player<'a>(snapshot: &'a Value, user: &UserId) -> &'a Value {
    snapshot["payload"]["players"]
        .as_array()
        .expect("players")
        .iter()
        .find(|p| p["userId"] == user.to_string())
        .expect("player in snapshot")
}

// =========================================================================
// Session basics
// =========================================================================

#[tokio::test]
async fn test_hello_replies_ack_with_user_id_and_request_id() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;
    let user = UserId::new();

    let ack = client
        .request("HELLO", json!({ "userId": user.to_string() }))
        .await;
    assert_eq!(ack["type"], "HELLO");
    assert_eq!(ack["requestId"], "req-1");
    assert_eq!(ack["payload"]["message"], "HELLO_ACK");
    assert_eq!(ack["payload"]["userId"], user.to_string());
}

#[tokio::test]
async fn test_ping_replies_pong() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    let pong = client.request("PING", Value::Null).await;
    assert_eq!(pong["type"], "PONG");
    assert!(pong["payload"]["ts"].is_string());
}

#[tokio::test]
async fn test_unknown_type_replies_error_with_request_id() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    let reply = client.request("DANCE", json!({})).await;
    assert_eq!(error_code(&reply), "UNKNOWN_TYPE");
    assert_eq!(reply["requestId"], "req-1");

    // The connection survives.
    let pong = client.request("ping", Value::Null).await;
    assert_eq!(pong["type"], "PONG");
}

#[tokio::test]
async fn test_invalid_payload_is_rejected() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    let reply = client
        .request("HELLO", json!({ "userId": "not-a-uuid" }))
        .await;
    assert_eq!(error_code(&reply), "INVALID_PAYLOAD");
}

#[tokio::test]
async fn test_malformed_line_is_ignored() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    client.send_raw("this is not json").await;
    client.send_raw("").await;
    let pong = client.request("PING", Value::Null).await;
    assert_eq!(pong["type"], "PONG");
    assert!(client.backlog.is_empty(), "malformed lines get no reply");
}

#[tokio::test]
async fn test_room_requests_before_hello_are_unauthenticated() {
    let server = start_server().await;
    let mut client = Client::connect(&server.addr).await;

    let reply = client.request("CREATE_ROOM", Value::Null).await;
    assert_eq!(error_code(&reply), "UNAUTHENTICATED");

    let reply = client
        .request("JOIN_ROOM", json!({ "roomCode": "123456" }))
        .await;
    assert_eq!(error_code(&reply), "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_requests_outside_a_room_are_not_in_room() {
    let server = start_server().await;
    let mut client = Client::connect_as(&server.addr, UserId::new()).await;

    let reply = client.request("LEAVE_ROOM", Value::Null).await;
    assert_eq!(error_code(&reply), "NOT_IN_ROOM");

    let reply = client.request("START_MATCH", Value::Null).await;
    assert_eq!(error_code(&reply), "NOT_IN_ROOM");

    let reply = client
        .request(
            "ANSWER",
            json!({ "questionId": "q1", "selectedOptionIndex": 0 }),
        )
        .await;
    assert_eq!(error_code(&reply), "NOT_IN_ROOM");
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_join_unknown_room_is_room_not_found() {
    let server = start_server().await;
    let mut client = Client::connect_as(&server.addr, UserId::new()).await;

    let reply = client
        .request("JOIN_ROOM", json!({ "roomCode": "000000" }))
        .await;
    assert_eq!(error_code(&reply), "ROOM_NOT_FOUND");

    let reply = client
        .request("JOIN_ROOM", json!({ "roomCode": "abc" }))
        .await;
    assert_eq!(error_code(&reply), "ROOM_NOT_FOUND");
}

#[tokio::test]
async fn test_join_room_replies_and_announces() {
    let server = start_server().await;
    let (user_a, user_b) = (UserId::new(), UserId::new());
    let mut a = Client::connect_as(&server.addr, user_a).await;
    let mut b = Client::connect_as(&server.addr, user_b).await;

    let code = a.create_room().await;
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let joined = b.request("JOIN_ROOM", json!({ "roomCode": code })).await;
    assert_eq!(joined["type"], "JOINED_ROOM");
    assert_eq!(joined["payload"]["roomCode"], code);
    assert_eq!(joined["payload"]["userId"], user_b.to_string());
    assert!(joined["payload"]["sessionId"].is_string());

    let announced = a.expect_type("PLAYER_JOINED").await;
    assert_eq!(announced["payload"]["userId"], user_b.to_string());
    let snapshot = a.expect_type("PLAYERS_SNAPSHOT").await;
    assert_eq!(snapshot["payload"]["players"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_room_cannot_be_rejoined() {
    let server = start_server().await;
    let mut a = Client::connect_as(&server.addr, UserId::new()).await;
    let mut b = Client::connect_as(&server.addr, UserId::new()).await;

    let code = a.create_room().await;
    assert_eq!(server.registry.room_count(), 1);

    let left = a.request("LEAVE_ROOM", Value::Null).await;
    assert_eq!(left["type"], "LEFT_ROOM");
    assert_eq!(left["payload"]["roomCode"], code);
    assert_eq!(server.registry.room_count(), 0);

    let reply = b.request("JOIN_ROOM", json!({ "roomCode": code })).await;
    assert_eq!(error_code(&reply), "ROOM_NOT_FOUND");
}

#[tokio::test]
async fn test_disconnect_evicts_room_of_last_member() {
    let server = start_server().await;
    let mut a = Client::connect_as(&server.addr, UserId::new()).await;
    a.create_room().await;
    assert_eq!(server.registry.room_count(), 1);

    drop(a);
    tokio::time::timeout(STEP_TIMEOUT, async {
        while server.registry.room_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room should be evicted after disconnect");
}

#[tokio::test]
async fn test_start_match_by_non_owner_is_forbidden() {
    let server = start_server().await;
    let mut a = Client::connect_as(&server.addr, UserId::new()).await;
    let mut b = Client::connect_as(&server.addr, UserId::new()).await;

    let code = a.create_room().await;
    b.request("JOIN_ROOM", json!({ "roomCode": code })).await;

    let reply = b.request("START_MATCH", Value::Null).await;
    assert_eq!(error_code(&reply), "FORBIDDEN_OR_INVALID_STATE");
}

// =========================================================================
// Matches
// =========================================================================

#[tokio::test]
async fn test_full_match_scores_answers_and_reports_once() {
    let server = start_server().await;
    let (user_a, user_b) = (UserId::new(), UserId::new());
    let mut a = Client::connect_as(&server.addr, user_a).await;
    let mut b = Client::connect_as(&server.addr, user_b).await;

    let code = a.create_room().await;
    b.request("JOIN_ROOM", json!({ "roomCode": code })).await;

    let started = a.request("START_MATCH", Value::Null).await;
    assert_eq!(started["type"], "MATCH_STARTED");
    assert_eq!(started["payload"]["roomCode"], code);

    // Both players see the same question, without the answer.
    let question_a = a.expect_type("QUESTION").await;
    let question_b = b.expect_type("QUESTION").await;
    assert_eq!(question_a["payload"], question_b["payload"]);
    assert_eq!(question_a["payload"]["questionId"], "q1");
    assert!(question_a["payload"].get("correctIndex").is_none());

    let ack = a
        .request(
            "ANSWER",
            json!({ "questionId": "q1", "selectedOptionIndex": 1 }),
        )
        .await;
    assert_eq!(ack["type"], "ANSWER");
    assert_eq!(ack["payload"]["ok"], true);
    let result_a = a.expect_type("ANSWER_RESULT").await;
    assert_eq!(result_a["payload"]["isCorrect"], true);
    let delta_a = result_a["payload"]["delta"].as_i64().unwrap();
    assert!((90..=100).contains(&delta_a), "fast answer scored {delta_a}");

    b.request(
        "ANSWER",
        json!({ "questionId": "q1", "selectedOptionIndex": 0 }),
    )
    .await;
    let result_b = b.expect_type("ANSWER_RESULT").await;
    assert_eq!(result_b["payload"]["isCorrect"], false);
    assert_eq!(result_b["payload"]["delta"], 0);

    let again = a
        .request(
            "ANSWER",
            json!({ "questionId": "q1", "selectedOptionIndex": 1 }),
        )
        .await;
    assert_eq!(error_code(&again), "ANSWER_REJECTED");

    let ended = a.expect_type("MATCH_ENDED").await;
    let results = ended["payload"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["userId"], user_a.to_string());
    assert_eq!(results[0]["score"], delta_a);
    assert_eq!(results[0]["correctAnswers"], 1);
    assert_eq!(results[1]["userId"], user_b.to_string());
    assert_eq!(results[1]["score"], 0);
    assert_eq!(results[1]["totalAnswers"], 1);
    b.expect_type("MATCH_ENDED").await;

    let report = server.reporter.wait_for_report().await;
    assert_eq!(report.room_code.as_str(), code);
    assert_eq!(report.players.len(), 2);
    assert!(report.started_at <= report.ended_at);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.reporter.count(), 1);

    let restart = a.request("START_MATCH", Value::Null).await;
    assert_eq!(error_code(&restart), "FORBIDDEN_OR_INVALID_STATE");
}

#[tokio::test]
async fn test_disconnect_mid_match_keeps_player_in_results() {
    let server = start_server().await;
    let (user_a, user_b) = (UserId::new(), UserId::new());
    let mut a = Client::connect_as(&server.addr, user_a).await;
    let mut b = Client::connect_as(&server.addr, user_b).await;

    let code = a.create_room().await;
    b.request("JOIN_ROOM", json!({ "roomCode": code })).await;
    a.request("START_MATCH", Value::Null).await;

    b.expect_type("QUESTION").await;
    b.request(
        "ANSWER",
        json!({ "questionId": "q1", "selectedOptionIndex": 1 }),
    )
    .await;
    let score_b = b.expect_type("ANSWER_RESULT").await["payload"]["totalScore"]
        .as_u64()
        .unwrap();
    assert!(score_b > 0);
    drop(b);

    let left = a.expect_type("PLAYER_LEFT").await;
    assert_eq!(left["payload"]["userId"], user_b.to_string());
    let snapshot = a.expect_type("PLAYERS_SNAPSHOT").await;
    let departed = player(&snapshot, &user_b);
    assert_eq!(departed["online"], false);
    assert_eq!(departed["score"], score_b);

    let ended = a.expect_type("MATCH_ENDED").await;
    let results = ended["payload"]["results"].as_array().unwrap();
    assert!(results.iter().any(|r| r["userId"] == user_b.to_string()));

    let report = server.reporter.wait_for_report().await;
    assert!(report.players.iter().any(|p| p.user_id == user_b));
    assert!(report.players.iter().any(|p| p.user_id == user_a));
}

// =========================================================================
// Shutdown and discovery
// =========================================================================

#[tokio::test]
async fn test_run_until_closes_sessions_and_returns() {
    let server = QuizServer::builder()
        .bind("127.0.0.1:0")
        .shutdown_grace(Duration::from_millis(200))
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().unwrap().to_string();
    let registry = server.registry();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async move {
        let _ = stop_rx.await;
    }));

    let mut client = Client::connect_as(&addr, UserId::new()).await;
    client.create_room().await;
    assert_eq!(registry.room_count(), 1);

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(STEP_TIMEOUT, running)
        .await
        .expect("server should stop")
        .expect("server task should not panic");
    assert!(result.is_ok());
    assert_eq!(registry.room_count(), 0);

    while client.read().await.is_some() {}
    assert!(TcpStream::connect(&addr).await.is_err());
}

#[tokio::test]
async fn test_discovery_answers_request() {
    let responder = DiscoveryResponder::bind(0, 5050).await.unwrap();
    let port = responder.local_addr().unwrap().port();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(responder.run_until(async move {
        let _ = stop_rx.await;
    }));

    let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"  quiz_discovery_request\n", ("127.0.0.1", port))
        .await
        .unwrap();
    let mut buf = [0u8; 256];
    let (len, _) = tokio::time::timeout(STEP_TIMEOUT, client.recv_from(&mut buf))
        .await
        .expect("discovery reply")
        .unwrap();
    assert_eq!(
        std::str::from_utf8(&buf[..len]).unwrap(),
        "QUIZ_DISCOVERY_RESPONSE|127.0.0.1|5050"
    );

    stop_tx.send(()).unwrap();
    tokio::time::timeout(STEP_TIMEOUT, running)
        .await
        .expect("responder should stop")
        .unwrap();
}
