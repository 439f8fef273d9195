//! Per-connection handler: framing, request dispatch, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the session's outbound queue onto the
//! socket. The flow is:
//!   1. Push a HELLO greeting with the server time
//!   2. Loop: read chunks -> LineDecoder -> ClientRequest -> dispatch
//!   3. On EOF, read error, or shutdown: leave the current room once

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use quizhub_protocol::payloads::{
    AnswerAckPayload, HelloPayload, JoinedRoomPayload, PongPayload, RoomCodePayload,
};
use quizhub_protocol::{
    AnswerRequest, ClientRequest, Envelope, ErrorCode, HelloRequest, JoinRoomRequest, LineDecoder,
    MessageType, ProtocolError, RoomCode, encode_line,
};
use quizhub_room::{RoomError, RoomRegistry};
use quizhub_session::{SessionError, SessionHandle, SessionState};
use quizhub_transport::{Connection, TcpConnection};
use tokio::sync::{mpsc, watch};

/// How long the writer gets to flush queued replies after the reader stops.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Greeting pushed to every new connection.
const WELCOME: &str = "Welcome to Quiz Server";

/// Drop guard that leaves the session's room when the handler exits.
///
/// This runs on every exit path: a clean EOF, a read error, shutdown, or
/// the task being aborted. Leaving is synchronous, so `Drop` can do it
/// directly, and `take_room` makes it happen at most once.
struct SessionGuard {
    state: SessionState,
    registry: Arc<RoomRegistry>,
}

impl SessionGuard {
    fn leave_current_room(&mut self) -> Option<RoomCode> {
        let code = self.state.take_room()?;
        self.registry.leave_room(&code, self.state.id());
        Some(code)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(code) = self.leave_current_room() {
            tracing::debug!(session = %self.state.id(), room = %code, "left room on disconnect");
        }
    }
}

/// A failed request, already mapped to its wire error code.
#[derive(Debug)]
struct HandlerError {
    code: ErrorCode,
    message: String,
}

impl HandlerError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn unauthenticated() -> Self {
        Self::new(
            ErrorCode::Unauthenticated,
            "send HELLO with a userId before using rooms",
        )
    }

    fn not_in_room() -> Self {
        Self::new(ErrorCode::NotInRoom, "you are not in a room")
    }
}

impl From<RoomError> for HandlerError {
    fn from(e: RoomError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<ProtocolError> for HandlerError {
    fn from(e: ProtocolError) -> Self {
        Self::new(ErrorCode::HandlerError, e.to_string())
    }
}

impl From<SessionError> for HandlerError {
    fn from(e: SessionError) -> Self {
        Self::new(ErrorCode::HandlerError, e.to_string())
    }
}

type HandlerResult = Result<Option<Envelope>, HandlerError>;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    registry: Arc<RoomRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), rx));

    let mut guard = SessionGuard {
        state: SessionState::new(tx),
        registry,
    };
    let session_id = guard.state.id();
    tracing::info!(%conn_id, session = %session_id, peer = %conn.peer_addr(), "client connected");

    let greeting = Envelope::new(
        MessageType::Hello,
        &HelloPayload {
            message: WELCOME.into(),
            user_id: None,
            server_time: Utc::now(),
        },
    );
    match greeting {
        Ok(hello) => {
            let _ = guard.state.send(hello);
        }
        Err(e) => tracing::warn!(error = %e, "failed to encode greeting"),
    }

    let mut decoder: LineDecoder = LineDecoder::new();
    loop {
        let chunk = tokio::select! {
            _ = shutdown.changed() => {
                tracing::debug!(session = %session_id, "shutdown signalled");
                break;
            }
            result = conn.recv() => match result {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    tracing::debug!(session = %session_id, "connection closed by peer");
                    break;
                }
                Err(e) => {
                    tracing::debug!(session = %session_id, error = %e, "recv error");
                    break;
                }
            },
        };

        for envelope in decoder.push(&chunk) {
            dispatch(&mut guard, envelope);
        }
    }

    // Leaving the room drops the room's copy of our sender; dropping the
    // guard drops ours. The writer then drains and exits.
    drop(guard);
    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
    let _ = conn.close().await;
    tracing::info!(%conn_id, session = %session_id, "client disconnected");
}

/// Drains the outbound queue onto the socket, one line per envelope.
async fn write_loop(conn: Arc<TcpConnection>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        let bytes = match encode_line(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// Decodes and handles one envelope, replying exactly once.
fn dispatch(guard: &mut SessionGuard, envelope: Envelope) {
    let request_id = envelope.request_id().map(str::to_owned);

    let outcome = match ClientRequest::decode(&envelope) {
        Ok(request) => {
            tracing::debug!(session = %guard.state.id(), kind = %request.kind(), "request");
            handle_request(guard, request, request_id.clone())
        }
        Err(e) => {
            tracing::debug!(session = %guard.state.id(), error = %e, "undecodable request");
            Err(HandlerError::new(e.code(), e.to_string()))
        }
    };

    let response = match outcome {
        Ok(Some(envelope)) => envelope,
        Ok(None) => return,
        Err(e) => Envelope::error(e.code, e.message),
    };
    if let Err(e) = guard.state.send(response.with_request_id(request_id)) {
        tracing::debug!(error = %e, "reply dropped");
    }
}

fn handle_request(
    guard: &mut SessionGuard,
    request: ClientRequest,
    request_id: Option<String>,
) -> HandlerResult {
    match request {
        ClientRequest::Hello(req) => handle_hello(guard, req),
        ClientRequest::Ping => Ok(Some(Envelope::new(
            MessageType::Pong,
            &PongPayload { ts: Utc::now() },
        )?)),
        ClientRequest::CreateRoom => handle_create_room(guard),
        ClientRequest::JoinRoom(req) => handle_join_room(guard, req),
        ClientRequest::LeaveRoom => handle_leave_room(guard),
        ClientRequest::StartMatch => handle_start_match(guard, request_id),
        ClientRequest::Answer(req) => handle_answer(guard, req),
    }
}

fn handle_hello(guard: &mut SessionGuard, req: HelloRequest) -> HandlerResult {
    if let Some(user_id) = req.user_id {
        if let Err(e) = guard.state.bind_user(user_id) {
            tracing::debug!(session = %guard.state.id(), error = %e, "keeping existing identity");
        }
    }
    Ok(Some(Envelope::new(
        MessageType::Hello,
        &HelloPayload {
            message: "HELLO_ACK".into(),
            user_id: guard.state.user_id(),
            server_time: Utc::now(),
        },
    )?))
}

fn authenticated(guard: &SessionGuard) -> Result<SessionHandle, HandlerError> {
    guard.state.handle().ok_or_else(HandlerError::unauthenticated)
}

fn handle_create_room(guard: &mut SessionGuard) -> HandlerResult {
    let handle = authenticated(guard)?;
    guard.leave_current_room();

    let room = guard.registry.create_room(handle)?;
    let code = room.code().clone();
    guard.state.enter_room(code.clone());
    Ok(Some(Envelope::new(
        MessageType::RoomCreated,
        &RoomCodePayload { room_code: code },
    )?))
}

fn handle_join_room(guard: &mut SessionGuard, req: JoinRoomRequest) -> HandlerResult {
    let handle = authenticated(guard)?;
    let not_found = || {
        HandlerError::new(
            ErrorCode::RoomNotFound,
            format!("room {} not found", req.room_code.trim()),
        )
    };
    let code = RoomCode::parse(&req.room_code).map_err(|_| not_found())?;
    // Check before leaving, so a bad code does not cost the current room.
    if guard.registry.room(&code).is_none() {
        return Err(not_found());
    }

    let user_id = handle.user_id();
    if guard.state.current_room() != Some(&code) {
        guard.leave_current_room();
        guard.registry.join_room(&code, handle)?;
        guard.state.enter_room(code.clone());
    }
    Ok(Some(Envelope::new(
        MessageType::JoinedRoom,
        &JoinedRoomPayload {
            room_code: code,
            session_id: guard.state.id(),
            user_id,
        },
    )?))
}

fn handle_leave_room(guard: &mut SessionGuard) -> HandlerResult {
    let code = guard.leave_current_room().ok_or_else(HandlerError::not_in_room)?;
    Ok(Some(Envelope::new(
        MessageType::LeftRoom,
        &RoomCodePayload { room_code: code },
    )?))
}

fn handle_start_match(guard: &mut SessionGuard, request_id: Option<String>) -> HandlerResult {
    let code = guard
        .state
        .current_room()
        .cloned()
        .ok_or_else(HandlerError::not_in_room)?;
    let handle = authenticated(guard)?;
    // MATCH_STARTED goes out through the room so it precedes the first question.
    guard.registry.start_match(&code, &handle, request_id)?;
    Ok(None)
}

fn handle_answer(guard: &mut SessionGuard, req: AnswerRequest) -> HandlerResult {
    let code = guard
        .state
        .current_room()
        .cloned()
        .ok_or_else(HandlerError::not_in_room)?;
    guard
        .registry
        .submit_answer(&code, guard.state.id(), &req)?;
    Ok(Some(Envelope::new(
        MessageType::Answer,
        &AnswerAckPayload {
            ok: true,
            question_id: req.question_id,
            selected_option_index: req.selected_option_index,
        },
    )?))
}
