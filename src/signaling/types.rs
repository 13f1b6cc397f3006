use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// Signaling relay errors.
///
/// None of these are ever reported back to a client: the relay logs them and
/// drops the offending message.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("connection {0} already joined room {1}")]
    AlreadyJoined(ConnectionId, RoomKey),

    #[error("room not found: {0}")]
    RoomNotFound(RoomKey),

    #[error("connection {0} is not a member of room {1}")]
    NotAMember(ConnectionId, RoomKey),

    #[error("internal error: {0}")]
    Internal(String),
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identity ("conn_" + counter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next identity. Never repeats within a process.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// Opaque room key chosen by the client (typically the dialed number).
///
/// The relay never interprets or normalizes it; two keys are the same room
/// iff they are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey(Arc<str>);

impl RoomKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RoomKey {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for RoomKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Serialize for RoomKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoomKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(RoomKey::from(s))
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

/// Sending half of a connection's outbound queue.
pub type PeerSender = mpsc::UnboundedSender<OutboundMessage>;

#[derive(Debug)]
pub(crate) struct Member {
    /// Channel for outbound messages to this connection.
    /// Closed once the connection's writer task is gone.
    pub tx: PeerSender,
}

impl Member {
    /// Queue a frame. A closed connection makes this a no-op.
    pub fn deliver(&self, msg: &OutboundMessage) -> bool {
        self.tx.send(msg.clone()).is_ok()
    }
}
