// ============================================
// File: crates/decada-agent/src/session/mod.rs
// ============================================
//! # Broker Session
//!
//! ## Main Functionality
//! - [`credentials`]: MQTT client id, username and signed password
//! - [`manager`]: Connection lifecycle, publish/subscribe and the
//!   inbound and keep-alive pumps
//!
//! ## Last Modified
//! v0.1.0 - Initial session module

pub mod credentials;
pub mod manager;

pub use credentials::SessionCredentials;
pub use manager::{InboundMessage, Publisher, SessionManager, SessionState};
