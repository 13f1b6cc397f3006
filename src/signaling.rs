//! WebSocket signaling relay for pairing peers by room key

mod actor;
mod messages;
mod rooms;
mod server;
mod types;

pub use actor::RoomManagerHandle;
pub use messages::{ClientMessage, ServerMessage};
pub use server::{DEFAULT_SIGNALING_PATH, DEFAULT_SIGNALING_PORT, SignalingServer};
pub use types::{ConnectionId, OutboundMessage, PeerSender, RoomKey, SignalingError};
