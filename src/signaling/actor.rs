use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::rooms::RoomTable;
use super::types::{ConnectionId, PeerSender, RoomKey, SignalingError};

const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Commands sent to the room manager actor
pub(crate) enum RoomCommand {
    Join {
        conn: ConnectionId,
        room: RoomKey,
        peer_tx: PeerSender,
        reply: oneshot::Sender<Result<bool, SignalingError>>,
    },
    Relay {
        conn: ConnectionId,
        room: RoomKey,
        data: Value,
    },
    Leave {
        conn: ConnectionId,
    },
    RoomSize {
        room: RoomKey,
        reply: oneshot::Sender<Option<usize>>,
    },
}

pub(crate) async fn room_manager_actor(mut rx: mpsc::Receiver<RoomCommand>) {
    let mut table = RoomTable::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Join {
                conn,
                room,
                peer_tx,
                reply,
            } => {
                let result = table.join(conn, room, peer_tx);
                if let Err(e) = &result {
                    debug!("Join from {} dropped: {}", conn, e);
                }
                let _ = reply.send(result);
            }

            RoomCommand::Relay { conn, room, data } => {
                if let Err(e) = table.relay(conn, &room, data) {
                    debug!("Signal from {} dropped: {}", conn, e);
                }
            }

            RoomCommand::Leave { conn } => {
                table.leave(conn);
            }

            RoomCommand::RoomSize { room, reply } => {
                let _ = reply.send(table.room_size(&room));
            }
        }
    }

    info!("Room manager stopped ({} room(s) dropped)", table.room_count());
}

/// Handle to communicate with the room manager actor
#[derive(Clone)]
pub struct RoomManagerHandle {
    pub(crate) tx: mpsc::Sender<RoomCommand>,
}

impl RoomManagerHandle {
    /// Spawn the room manager on the current runtime and return its handle
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<RoomCommand>(COMMAND_QUEUE_CAPACITY);
        tokio::spawn(room_manager_actor(rx));
        Self { tx }
    }

    /// Join a room. The `joined` ack is queued on `peer_tx` by the actor;
    /// the returned flag says whether this connection is the initiator.
    pub async fn join_room(
        &self,
        conn: ConnectionId,
        room: RoomKey,
        peer_tx: PeerSender,
    ) -> Result<bool, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            conn,
            room,
            peer_tx,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))?
    }

    /// Forward a payload to the other members of `room`
    pub async fn relay(
        &self,
        conn: ConnectionId,
        room: RoomKey,
        data: Value,
    ) -> Result<(), SignalingError> {
        self.send(RoomCommand::Relay { conn, room, data }).await
    }

    /// Leave whatever room the connection joined
    pub async fn leave_room(&self, conn: ConnectionId) {
        let _ = self.send(RoomCommand::Leave { conn }).await;
    }

    /// Current member count of `room`, `None` if the room does not exist
    pub async fn room_size(&self, room: RoomKey) -> Result<Option<usize>, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::RoomSize {
            room,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), SignalingError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }
}
