// ============================================
// File: crates/decada-core/src/protocol/messages.rs
// ============================================
//! # Session Packet Definitions
//!
//! ## Creation Reason
//! Defines the MQTT 3.1.1 control packets the session actually uses.
//! This is not a general-purpose MQTT implementation: only CONNECT,
//! CONNACK, PUBLISH, PUBACK, SUBSCRIBE, SUBACK, PINGREQ, PINGRESP and
//! DISCONNECT are modelled.
//!
//! ## Fixed Header
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────────┐
//! │ type (4 bit) │ flags (4 bit)│ remaining length (1-4 bytes) │
//! └──────────────┴──────────────┴──────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Outbound publishes are QoS 0 (at-most-once)
//! - `Connect::password` is redacted from `Debug`
//!
//! ## Last Modified
//! v0.1.0 - Initial packet definitions

use std::fmt;

use bytes::Bytes;

// ============================================
// Constants
// ============================================

/// Protocol name carried in CONNECT.
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Largest value the remaining-length varint can encode.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Maximum number of topics in a single SUBSCRIBE.
pub const MAX_TOPICS_PER_SUBSCRIBE: usize = u16::MAX as usize;

// ============================================
// PacketType
// ============================================

/// Control packet type (upper nibble of the first header byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Client connection request.
    Connect = 1,
    /// Connection acknowledgment.
    ConnAck = 2,
    /// Application message.
    Publish = 3,
    /// QoS 1 publish acknowledgment.
    PubAck = 4,
    /// Subscription request.
    Subscribe = 8,
    /// Subscription acknowledgment.
    SubAck = 9,
    /// Keep-alive request.
    PingReq = 12,
    /// Keep-alive response.
    PingResp = 13,
    /// Client is disconnecting.
    Disconnect = 14,
}

impl PacketType {
    /// Parses the packet type from the first header byte.
    #[must_use]
    pub const fn from_header(byte: u8) -> Option<Self> {
        match byte >> 4 {
            1 => Some(Self::Connect),
            2 => Some(Self::ConnAck),
            3 => Some(Self::Publish),
            4 => Some(Self::PubAck),
            8 => Some(Self::Subscribe),
            9 => Some(Self::SubAck),
            12 => Some(Self::PingReq),
            13 => Some(Self::PingResp),
            14 => Some(Self::Disconnect),
            _ => None,
        }
    }

    /// Returns the upper-nibble value.
    #[must_use]
    pub const fn as_nibble(self) -> u8 {
        self as u8
    }
}

// ============================================
// ConnectReturnCode
// ============================================

/// CONNACK return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    /// Connection accepted.
    Accepted,
    /// Broker does not support protocol level 4.
    UnacceptableProtocol,
    /// Client identifier rejected.
    IdentifierRejected,
    /// Broker unavailable.
    ServerUnavailable,
    /// Username or password malformed or wrong.
    BadCredentials,
    /// Client not authorized.
    NotAuthorized,
    /// Reserved code.
    Other(u8),
}

impl ConnectReturnCode {
    /// Parses a wire byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Accepted,
            1 => Self::UnacceptableProtocol,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadCredentials,
            5 => Self::NotAuthorized,
            other => Self::Other(other),
        }
    }

    /// Returns the wire byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Accepted => 0,
            Self::UnacceptableProtocol => 1,
            Self::IdentifierRejected => 2,
            Self::ServerUnavailable => 3,
            Self::BadCredentials => 4,
            Self::NotAuthorized => 5,
            Self::Other(code) => code,
        }
    }
}

// ============================================
// Connect
// ============================================

/// CONNECT packet.
#[derive(Clone, PartialEq, Eq)]
pub struct Connect {
    /// Client identifier.
    pub client_id: String,
    /// Username, if any.
    pub username: Option<String>,
    /// Password, if any.
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Start a clean session.
    pub clean_session: bool,
}

impl fmt::Debug for Connect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connect")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("clean_session", &self.clean_session)
            .finish()
    }
}

// ============================================
// Publish
// ============================================

/// PUBLISH packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    /// Topic name.
    pub topic: String,
    /// Application payload.
    pub payload: Bytes,
    /// Quality of service (0 or 1).
    pub qos: u8,
    /// Packet identifier, present when `qos > 0`.
    pub packet_id: Option<u16>,
    /// Retain flag.
    pub retain: bool,
    /// Duplicate delivery flag.
    pub dup: bool,
}

impl Publish {
    /// Creates an at-most-once publish.
    #[must_use]
    pub fn at_most_once(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: 0,
            packet_id: None,
            retain: false,
            dup: false,
        }
    }
}

// ============================================
// Packet
// ============================================

/// Any control packet understood by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// CONNECT.
    Connect(Connect),
    /// CONNACK.
    ConnAck {
        /// Broker already held session state.
        session_present: bool,
        /// Result of the connection attempt.
        return_code: ConnectReturnCode,
    },
    /// PUBLISH.
    Publish(Publish),
    /// PUBACK.
    PubAck {
        /// Acknowledged packet identifier.
        packet_id: u16,
    },
    /// SUBSCRIBE (every topic requested at QoS 0).
    Subscribe {
        /// Packet identifier.
        packet_id: u16,
        /// Topic filters.
        topics: Vec<String>,
    },
    /// SUBACK.
    SubAck {
        /// Acknowledged packet identifier.
        packet_id: u16,
        /// Granted QoS per topic, 0x80 on failure.
        return_codes: Vec<u8>,
    },
    /// PINGREQ.
    PingReq,
    /// PINGRESP.
    PingResp,
    /// DISCONNECT.
    Disconnect,
}

impl Packet {
    /// Returns the packet type.
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(_) => PacketType::Connect,
            Self::ConnAck { .. } => PacketType::ConnAck,
            Self::Publish(_) => PacketType::Publish,
            Self::PubAck { .. } => PacketType::PubAck,
            Self::Subscribe { .. } => PacketType::Subscribe,
            Self::SubAck { .. } => PacketType::SubAck,
            Self::PingReq => PacketType::PingReq,
            Self::PingResp => PacketType::PingResp,
            Self::Disconnect => PacketType::Disconnect,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_from_header() {
        assert_eq!(PacketType::from_header(0x30), Some(PacketType::Publish));
        assert_eq!(PacketType::from_header(0x82), Some(PacketType::Subscribe));
        assert_eq!(PacketType::from_header(0xD0), Some(PacketType::PingResp));
        assert_eq!(PacketType::from_header(0x00), None);
        assert_eq!(PacketType::from_header(0xF0), None);
    }

    #[test]
    fn test_return_code_mapping() {
        assert_eq!(ConnectReturnCode::from_byte(0), ConnectReturnCode::Accepted);
        assert_eq!(ConnectReturnCode::from_byte(4), ConnectReturnCode::BadCredentials);
        assert_eq!(ConnectReturnCode::from_byte(9), ConnectReturnCode::Other(9));
        assert_eq!(ConnectReturnCode::Other(9).as_byte(), 9);
    }

    #[test]
    fn test_connect_debug_redacts_password() {
        let connect = Connect {
            client_id: "dev".into(),
            username: Some("dev&pk".into()),
            password: Some("hunter2".into()),
            keep_alive_secs: 60,
            clean_session: true,
        };
        let debug = format!("{connect:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("dev&pk"));
    }
}
