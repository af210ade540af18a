// ============================================
// File: crates/decada-agent/src/lib.rs
// ============================================
//! # DECADA Agent Library
//!
//! ## Creation Reason
//! Provisions an embedded device against the DECADA cloud and keeps an
//! authenticated telemetry session open for it.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Agent configuration management
//! - [`agent`]: Boot sequence and lifecycle
//! - [`provisioning`]: Certificate issuance and device registration
//!   - [`provisioning::client`]: Signed REST client
//!   - [`provisioning::certificate`]: Key pair, CSR, signed certificate
//!   - [`provisioning::registration`]: Create-or-fetch device secret
//! - [`session`]: Broker connection, pumps, publish/subscribe
//! - [`handlers`]: Inbound command dispatch
//! - [`logging`]: Subscriber setup with a reloadable level
//! - [`services`]: Watchdog, restart hook, mailbox, store, telemetry
//! - [`error`]: Agent-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          DECADA Agent                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│    Agent    │────►│    Handlers     │    │
//! │  │             │     │ Orchestrator│     │  (commands)     │    │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     │             │
//! │         ┌───────────────────┼─────────────────────┘             │
//! │         ▼                   ▼                                   │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐        │
//! │  │Provisioning │     │   Session   │     │  Services   │        │
//! │  │ cert + reg. │     │   Manager   │     │ wdt/mailbox │        │
//! │  └─────────────┘     └─────────────┘     └─────────────┘        │
//! │                                                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                       Transport Layer                           │
//! │  ┌─────────────────────┐     ┌─────────────────────────────┐    │
//! │  │   HTTPS (REST API)  │     │  DNS + TLS socket (broker)  │    │
//! │  └─────────────────────┘     └─────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Producer → mailbox → consumer → publish → broker
//! broker → inbound pump → dispatcher → handler → reply publish
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A fresh key pair is generated on every boot; keys are never reused
//! - Fatal errors restart the process rather than retrying in place
//! - Configuration changes require restart (no hot-reload)
//!
//! ## Last Modified
//! v0.1.0 - Initial agent library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod provisioning;
pub mod services;
pub mod session;

// Re-export primary types
pub use agent::{Agent, AgentDeps};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use session::{SessionManager, SessionState};
