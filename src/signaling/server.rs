use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, info, warn};

use super::actor::RoomManagerHandle;
use super::messages::ClientMessage;
use super::types::{ConnectionId, OutboundMessage, PeerSender, RoomKey, SignalingError};
use crate::config::{Keepalive, RelayConfig};

pub const DEFAULT_SIGNALING_PORT: u16 = 3000;
pub const DEFAULT_SIGNALING_PATH: &str = "/signaling";
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub struct SignalingServer {
    handle: RoomManagerHandle,
    path: Arc<str>,
    keepalive: Option<Keepalive>,
}

impl SignalingServer {
    /// Create the server and spawn its room manager on the current runtime
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            handle: RoomManagerHandle::spawn(),
            path: Arc::from(config.path.as_str()),
            keepalive: config.keepalive(),
        }
    }

    pub fn handle(&self) -> RoomManagerHandle {
        self.handle.clone()
    }

    pub async fn run(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until the task is dropped
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let local = listener.local_addr()?;
        info!("Signaling relay listening on ws://{}{}", local, self.path);

        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue;
                }
            };
            let handle = self.handle.clone();
            let path = self.path.clone();
            let keepalive = self.keepalive;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle, path, keepalive).await {
                    debug!("Connection from {} ended with error: {}", addr, e);
                }
            });
        }
    }
}

/// Per-connection record: identity, outbound queue and joined room.
struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    tx: PeerSender,
    joined: Option<RoomKey>,
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RoomManagerHandle,
    path: Arc<str>,
    keepalive: Option<Keepalive>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let check_path = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() == &*path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some("not found".to_string()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, check_path).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let mut conn = Connection {
        id: ConnectionId::next(),
        addr,
        tx,
        joined: None,
    };
    info!("WebSocket connection {} from {}", conn.id, addr);

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                // flushes a queued close reply, or starts the close handshake
                _ = &mut shutdown_rx => {
                    let _ = ws_tx.close().await;
                    break;
                }
            }
        }
    });

    let mut ping_timer: Option<Interval> =
        keepalive.map(|k| tokio::time::interval_at(Instant::now() + k.interval, k.interval));
    let pong_wait = keepalive.map(|k| k.pong_timeout).unwrap_or_default();
    let mut waiting_for_pong = false;
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let ping_tick = async {
            match ping_timer.as_mut() {
                Some(timer) => {
                    timer.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        let pong_timeout = async {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_tick => {
                if waiting_for_pong {
                    continue;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                waiting_for_pong = true;
                pong_deadline = Some(Instant::now() + pong_wait);
                debug!("Ping sent to {}", conn.id);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", conn.id);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error on {}: {}", conn.id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        if let Err(e) = handle_text_message(&text, &mut conn, &handle).await {
                            debug!("Dropped message from {}: {}", conn.id, e);
                        }
                    }
                    Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                        Ok(text) => {
                            if let Err(e) = handle_text_message(text, &mut conn, &handle).await {
                                debug!("Dropped message from {}: {}", conn.id, e);
                            }
                        }
                        Err(_) => debug!("Dropped non UTF-8 binary frame from {}", conn.id),
                    },
                    Message::Pong(_) => {
                        waiting_for_pong = false;
                        pong_deadline = None;
                        debug!("Pong received from {}", conn.id);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", conn.id);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    if conn.joined.take().is_some() {
        handle.leave_room(conn.id).await;
    }

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        send_task.abort();
    }
    info!("WebSocket disconnected: {} ({})", conn.id, conn.addr);

    Ok(())
}

async fn handle_text_message(
    text: &str,
    conn: &mut Connection,
    handle: &RoomManagerHandle,
) -> Result<(), SignalingError> {
    match ClientMessage::decode(text)? {
        ClientMessage::Join { room } => {
            let room = non_empty(room)?;
            if let Some(current) = &conn.joined {
                return Err(SignalingError::AlreadyJoined(conn.id, current.clone()));
            }
            handle.join_room(conn.id, room.clone(), conn.tx.clone()).await?;
            conn.joined = Some(room);
        }

        ClientMessage::Signal { room, data } => {
            let room = non_empty(room)?;
            let data =
                data.ok_or_else(|| SignalingError::Malformed("signal without data".to_string()))?;
            handle.relay(conn.id, room, data).await?;
        }
    }

    Ok(())
}

fn non_empty(room: Option<RoomKey>) -> Result<RoomKey, SignalingError> {
    room.filter(|r| !r.is_empty())
        .ok_or_else(|| SignalingError::Malformed("missing or empty room".to_string()))
}
