use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, error, info};

use super::messages::ServerMessage;
use super::types::{ConnectionId, Member, OutboundMessage, PeerSender, RoomKey, SignalingError};

#[derive(Debug, Default)]
pub(crate) struct Room {
    pub members: HashMap<ConnectionId, Member>,
}

impl Room {
    /// Queue `msg` for every member except `skip`.
    fn broadcast(&self, msg: &OutboundMessage, skip: Option<ConnectionId>) -> usize {
        self.members
            .iter()
            .filter(|(id, _)| Some(**id) != skip)
            .filter(|(_, member)| member.deliver(msg))
            .count()
    }
}

/// The room table and the join / relay / leave rules.
///
/// Owned by the room manager actor; nothing else touches it, so every
/// operation observes and mutates a consistent membership.
#[derive(Debug, Default)]
pub(crate) struct RoomTable {
    rooms: HashMap<RoomKey, Room>,
    memberships: HashMap<ConnectionId, RoomKey>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to `key`, creating the room if needed.
    ///
    /// The `joined` ack is queued on `tx` before returning. Returns whether
    /// the connection is the initiator.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        key: RoomKey,
        tx: PeerSender,
    ) -> Result<bool, SignalingError> {
        if key.is_empty() {
            return Err(SignalingError::Malformed("empty room key".to_string()));
        }
        if let Some(current) = self.memberships.get(&conn) {
            return Err(SignalingError::AlreadyJoined(conn, current.clone()));
        }

        let initiator = self
            .rooms
            .get(&key)
            .is_none_or(|room| room.members.is_empty());
        let ack = ServerMessage::Joined { initiator }.encode()?;
        let peer_joined = ServerMessage::PeerJoined.encode()?;

        let room = self.rooms.entry(key.clone()).or_default();
        if !initiator {
            let notified = room.broadcast(&peer_joined, None);
            debug!("Notified {} member(s) of {} about {}", notified, key, conn);
        }

        let member = Member { tx };
        member.deliver(&ack);
        room.members.insert(conn, member);

        info!(
            "Connection {} joined room {} (initiator: {}, members: {})",
            conn,
            key,
            initiator,
            room.members.len()
        );
        self.memberships.insert(conn, key);

        Ok(initiator)
    }

    /// Forward `data` to every member of `key` other than `from`.
    pub fn relay(
        &self,
        from: ConnectionId,
        key: &RoomKey,
        data: Value,
    ) -> Result<usize, SignalingError> {
        let room = self
            .rooms
            .get(key)
            .ok_or_else(|| SignalingError::RoomNotFound(key.clone()))?;
        if !room.members.contains_key(&from) {
            return Err(SignalingError::NotAMember(from, key.clone()));
        }

        let msg = ServerMessage::Signal { data }.encode()?;
        let delivered = room.broadcast(&msg, Some(from));
        debug!("Relayed signal from {} to {} peer(s) in {}", from, delivered, key);

        Ok(delivered)
    }

    /// Remove `conn` from whatever room it joined. No-op if it never joined.
    pub fn leave(&mut self, conn: ConnectionId) -> Option<RoomKey> {
        let key = self.memberships.remove(&conn)?;

        let Some(room) = self.rooms.get_mut(&key) else {
            error!("Membership index points at missing room {}", key);
            return None;
        };
        room.members.remove(&conn);
        info!("Connection {} left room {}", conn, key);

        if room.members.is_empty() {
            self.rooms.remove(&key);
            info!("Room {} removed (empty)", key);
        } else {
            match ServerMessage::PeerLeft.encode() {
                Ok(msg) => {
                    room.broadcast(&msg, None);
                }
                Err(e) => error!("{}", e),
            }
        }

        Some(key)
    }

    pub fn room_size(&self, key: &RoomKey) -> Option<usize> {
        self.rooms.get(key).map(|room| room.members.len())
    }

    #[cfg(test)]
    pub fn room_of(&self, conn: ConnectionId) -> Option<&RoomKey> {
        self.memberships.get(&conn)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
