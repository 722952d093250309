pub mod actor;
pub mod handler;
pub mod protocol;

use axum::extract::ws::{CloseFrame, Message};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// The session's writer task owns the receiving half and forwards to the socket.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Close code sent to a connection that was replaced by a newer one for the same client.
pub const CLOSE_SUPERSEDED: u16 = 4000;

/// Process-unique identity of one accepted WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The writer half of a connection is gone, nothing more can be sent on it.
#[derive(Debug, thiserror::Error)]
#[error("{0} is closed")]
pub struct TransmitError(pub ConnectionId);

/// Cloneable handle used to push frames to one client.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: ConnectionSender,
}

impl Connection {
    pub fn new(sender: ConnectionSender) -> Self {
        Self {
            id: ConnectionId::next(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, message: Message) -> Result<(), TransmitError> {
        self.sender.send(message).map_err(|_| TransmitError(self.id))
    }

    pub fn send_text(&self, text: &str) -> Result<(), TransmitError> {
        self.send(Message::Text(text.to_owned().into()))
    }

    /// Queue a Close frame. The peer's session ends once it acknowledges.
    pub fn close(&self, code: u16, reason: &str) -> Result<(), TransmitError> {
        self.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_owned().into(),
        })))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
