//! Session types: what the server knows about one connection.
//!
//! A session is created when a client connects and dies with the
//! connection. It tracks:
//! - WHO the client says it is (`UserId`, bound once by HELLO)
//! - WHERE it is (the room it currently sits in, if any)
//! - HOW to reach it (the outbound queue its writer task drains)

use quizhub_protocol::{Envelope, RoomCode, SessionId, UserId};
use tokio::sync::mpsc;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// A cheap, cloneable way to push messages to one session.
///
/// Rooms keep one handle per member. Sending never blocks: envelopes go
/// into an unbounded queue that the session's writer task drains onto
/// the socket, so a slow client cannot stall a broadcast.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    user_id: UserId,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl SessionHandle {
    /// Wraps an outbound queue for an authenticated session.
    pub fn new(id: SessionId, user_id: UserId, outbound: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            id,
            user_id,
            outbound,
        }
    }

    /// Queues an envelope for delivery.
    pub fn send(&self, envelope: Envelope) -> Result<(), SessionError> {
        self.outbound
            .send(envelope)
            .map_err(|_| SessionError::Closed(self.id))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Mutable per-connection state, owned by the connection's task.
///
/// Only the owning task touches this, so nothing here is synchronized.
/// Everything other tasks need goes through a [`SessionHandle`].
#[derive(Debug)]
pub struct SessionState {
    id: SessionId,
    user_id: Option<UserId>,
    current_room: Option<RoomCode>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl SessionState {
    /// Creates a fresh, unauthenticated session with a new id.
    pub fn new(outbound: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            id: SessionId::new(),
            user_id: None,
            current_room: None,
            outbound,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The bound user, if HELLO has happened.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Binds the session to a user id.
    ///
    /// The first bind wins. Binding the same id again is a no-op; binding
    /// a different one fails and leaves the original in place.
    pub fn bind_user(&mut self, user_id: UserId) -> Result<UserId, SessionError> {
        match self.user_id {
            None => {
                self.user_id = Some(user_id);
                tracing::debug!(session = %self.id, user = %user_id, "session bound");
                Ok(user_id)
            }
            Some(bound) if bound == user_id => Ok(bound),
            Some(bound) => Err(SessionError::AlreadyBound {
                bound,
                requested: user_id,
            }),
        }
    }

    /// The room this session currently sits in.
    pub fn current_room(&self) -> Option<&RoomCode> {
        self.current_room.as_ref()
    }

    /// Records that the session entered `room`, returning the room it was
    /// in before (if any).
    pub fn enter_room(&mut self, room: RoomCode) -> Option<RoomCode> {
        self.current_room.replace(room)
    }

    /// Clears and returns the current room.
    ///
    /// Leaving goes through this so a room is left at most once, whether
    /// by LEAVE_ROOM, by joining elsewhere, or by disconnecting.
    pub fn take_room(&mut self) -> Option<RoomCode> {
        self.current_room.take()
    }

    /// A handle other tasks can use to reach this session.
    ///
    /// `None` until a user is bound: rooms only hold authenticated members.
    pub fn handle(&self) -> Option<SessionHandle> {
        self.user_id
            .map(|user_id| SessionHandle::new(self.id, user_id, self.outbound.clone()))
    }

    /// Queues a direct reply to this session.
    pub fn send(&self, envelope: Envelope) -> Result<(), SessionError> {
        self.outbound
            .send(envelope)
            .map_err(|_| SessionError::Closed(self.id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use quizhub_protocol::MessageType;

    fn state() -> (SessionState, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionState::new(tx), rx)
    }

    #[test]
    fn test_bind_user_first_bind_wins() {
        let (mut s, _rx) = state();
        let first = UserId::new();
        let second = UserId::new();

        assert_eq!(s.bind_user(first).unwrap(), first);
        assert_eq!(s.bind_user(first).unwrap(), first, "rebinding same id is fine");
        assert!(matches!(
            s.bind_user(second),
            Err(SessionError::AlreadyBound { bound, .. }) if bound == first
        ));
        assert_eq!(s.user_id(), Some(first));
    }

    #[test]
    fn test_handle_requires_bound_user() {
        let (mut s, _rx) = state();
        assert!(s.handle().is_none());
        let user = UserId::new();
        s.bind_user(user).unwrap();
        let handle = s.handle().unwrap();
        assert_eq!(handle.user_id(), user);
        assert_eq!(handle.id(), s.id());
    }

    #[test]
    fn test_take_room_returns_room_once() {
        let (mut s, _rx) = state();
        let code = RoomCode::parse("123456").unwrap();
        assert_eq!(s.enter_room(code.clone()), None);
        assert_eq!(s.current_room(), Some(&code));
        assert_eq!(s.take_room(), Some(code));
        assert_eq!(s.take_room(), None);
    }

    #[test]
    fn test_enter_room_returns_previous() {
        let (mut s, _rx) = state();
        let a = RoomCode::parse("111111").unwrap();
        let b = RoomCode::parse("222222").unwrap();
        s.enter_room(a.clone());
        assert_eq!(s.enter_room(b), Some(a));
    }

    #[test]
    fn test_handle_send_reaches_receiver() {
        let (mut s, mut rx) = state();
        s.bind_user(UserId::new()).unwrap();
        let handle = s.handle().unwrap();
        handle
            .send(Envelope::new(MessageType::Pong, &serde_json::Value::Null).unwrap())
            .unwrap();
        let got = rx.try_recv().unwrap();
        assert_eq!(got.kind(), Some(MessageType::Pong));
    }

    #[test]
    fn test_handle_send_after_receiver_dropped_is_closed() {
        let (mut s, rx) = state();
        s.bind_user(UserId::new()).unwrap();
        let handle = s.handle().unwrap();
        drop(rx);
        assert!(handle.is_closed());
        let err = handle.send(Envelope::error(quizhub_protocol::ErrorCode::HandlerError, "x"));
        assert!(matches!(err, Err(SessionError::Closed(_))));
    }
}
