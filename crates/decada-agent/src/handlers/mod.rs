// ============================================
// File: crates/decada-agent/src/handlers/mod.rs
// ============================================
//! # Handlers
//!
//! ## Creation Reason
//! Processing of messages the broker delivers on subscribed topics.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`command`]: Command parsing, dispatch and acknowledgment
//!
//! ## Handler Architecture
//! ```text
//! SessionManager (inbound pump)
//!        │  mpsc<InboundMessage>
//!        ▼
//! ┌─────────────────────────────────────┐
//! │ Dispatcher                          │
//! │   parse ─► CommandHandler ─► ack ───┼──► Publisher
//! └─────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers run on the dispatcher task, never on the pump
//! - Keep `handle_param` non-blocking
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers module

pub mod command;

pub use command::{CommandHandler, Dispatcher, SetPointTable};
