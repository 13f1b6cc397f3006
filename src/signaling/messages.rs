use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{OutboundMessage, RoomKey, SignalingError};

/// Messages sent from client to relay
///
/// Required fields are optional at the serde level so that a message with a
/// missing field still decodes; the relay then drops it by inspection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join a room by key
    #[serde(rename = "join")]
    Join {
        #[serde(default)]
        room: Option<RoomKey>,
    },

    /// Forward an opaque handshake payload to the other members of a room
    #[serde(rename = "signal")]
    Signal {
        #[serde(default)]
        room: Option<RoomKey>,
        #[serde(default)]
        data: Option<Value>,
    },
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(text).map_err(|e| SignalingError::Malformed(e.to_string()))
    }
}

/// Messages sent from relay to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Join acknowledged; `initiator` is true only for the first member
    #[serde(rename = "joined")]
    Joined { initiator: bool },

    /// Another peer joined the room
    #[serde(rename = "peer-joined")]
    PeerJoined,

    /// Forwarded handshake payload, untouched
    #[serde(rename = "signal")]
    Signal { data: Value },

    /// A peer left the room
    #[serde(rename = "peer-left")]
    PeerLeft,
}

impl ServerMessage {
    pub fn encode(&self) -> Result<OutboundMessage, SignalingError> {
        serde_json::to_string(self)
            .map(OutboundMessage::from)
            .map_err(|e| SignalingError::Internal(format!("encode failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_join() {
        let json = r#"{"type": "join", "room": "256700111222"}"#;
        let msg = ClientMessage::decode(json).unwrap();
        if let ClientMessage::Join { room } = msg {
            assert_eq!(room.unwrap().as_str(), "256700111222");
        } else {
            panic!("Expected Join");
        }
    }

    #[test]
    fn parse_join_without_room() {
        let msg = ClientMessage::decode(r#"{"type": "join"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join { room: None }));
    }

    #[test]
    fn parse_join_with_numeric_room_is_malformed() {
        let err = ClientMessage::decode(r#"{"type": "join", "room": 256700111222}"#).unwrap_err();
        assert!(matches!(err, SignalingError::Malformed(_)));
    }

    #[test]
    fn parse_signal() {
        let json = r#"{"type": "signal", "room": "r1", "data": {"sdp": "v=0"}}"#;
        let msg = ClientMessage::decode(json).unwrap();
        if let ClientMessage::Signal { room, data } = msg {
            assert_eq!(room.unwrap().as_str(), "r1");
            assert_eq!(data.unwrap(), json!({"sdp": "v=0"}));
        } else {
            panic!("Expected Signal");
        }
    }

    #[test]
    fn parse_signal_with_null_data() {
        let msg =
            ClientMessage::decode(r#"{"type": "signal", "room": "r1", "data": null}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Signal { data: None, .. }));
    }

    #[test]
    fn ignores_unknown_fields() {
        let msg = ClientMessage::decode(r#"{"type": "join", "room": "r1", "extra": 1}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join { room: Some(_) }));
    }

    #[test]
    fn rejects_unknown_type_and_garbage() {
        assert!(ClientMessage::decode(r#"{"type": "leave"}"#).is_err());
        assert!(ClientMessage::decode(r#"{"room": "r1"}"#).is_err());
        assert!(ClientMessage::decode("not json").is_err());
        assert!(ClientMessage::decode("[]").is_err());
    }

    #[test]
    fn serialize_joined() {
        let out = ServerMessage::Joined { initiator: true }.encode().unwrap();
        assert_eq!(out.as_str(), r#"{"type":"joined","initiator":true}"#);
    }

    #[test]
    fn serialize_peer_events() {
        assert_eq!(
            ServerMessage::PeerJoined.encode().unwrap().as_str(),
            r#"{"type":"peer-joined"}"#
        );
        assert_eq!(
            ServerMessage::PeerLeft.encode().unwrap().as_str(),
            r#"{"type":"peer-left"}"#
        );
    }

    #[test]
    fn signal_payload_keeps_key_order() {
        let data: Value =
            serde_json::from_str(r#"{"type":"offer","sdp":"v=0","z":1,"a":2}"#).unwrap();
        let out = ServerMessage::Signal { data }.encode().unwrap();
        assert_eq!(
            out.as_str(),
            r#"{"type":"signal","data":{"type":"offer","sdp":"v=0","z":1,"a":2}}"#
        );
    }
}
