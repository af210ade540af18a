// ============================================
// File: crates/decada-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the session wire protocol: the control packets exchanged with
//! the broker and the JSON envelopes carried inside them.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`messages`]: Control packet structures (CONNECT, PUBLISH, ...)
//! - [`codec`]: Binary serialization/deserialization
//! - [`envelope`]: Command, acknowledgment and telemetry JSON shapes
//! - [`topics`]: Topic names per product and device
//!
//! ## Session Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Device ───── CONNECT (client id, user, password) ──► Broker│
//! │  Device ◄──── CONNACK ─────────────────────────────── Broker│
//! │  Device ───── SUBSCRIBE .../measurepoint/set ───────► Broker│
//! │                                                             │
//! │  Device ───── PUBLISH .../measurepoint/post ────────► Broker│
//! │  Device ◄──── PUBLISH .../measurepoint/set ────────── Broker│
//! │  Device ───── PUBLISH .../measurepoint/set_reply ───► Broker│
//! │  Device ───── PINGREQ ──────────────────────────────► Broker│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only the packets listed above are supported
//! - Envelope validation failures are never fatal to the session
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod envelope;
pub mod messages;
pub mod topics;

pub use codec::{Codec, PacketCodec};
pub use envelope::{CommandAck, CommandEnvelope, MeasurepointPost, METHOD_MEASUREPOINT_POST};
pub use messages::{Connect, ConnectReturnCode, Packet, PacketType, Publish};
pub use topics::TopicSet;
