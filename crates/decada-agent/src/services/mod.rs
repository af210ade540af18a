// ============================================
// File: crates/decada-agent/src/services/mod.rs
// ============================================
//! # Agent Services
//!
//! ## Creation Reason
//! Device-side services shared by provisioning and the steady-state
//! loop.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`mailbox`]: Length-checked producer/consumer hand-off
//! - [`restart`]: Restart hook for fatal conditions
//! - [`store`]: Persistent key/value storage
//! - [`telemetry`]: Periodic measure-point producer
//! - [`watchdog`]: Channel watchdog and its supervisor
//!
//! ## Service Dependencies
//! ```text
//! ┌─────────────────┐  mailbox   ┌──────────────────┐
//! │TelemetryProducer│───────────►│  consumer loop   │──► SessionManager
//! └────────┬────────┘            └────────┬─────────┘
//!          │ feed                         │ feed / restart
//!          ▼                              ▼
//! ┌─────────────────────────────────────────────────┐
//! │      SoftwareWatchdog ──starved──► Restarter    │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial services module

pub mod mailbox;
pub mod restart;
pub mod store;
pub mod telemetry;
pub mod watchdog;

// Re-export primary types
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};
pub use restart::{ProcessRestarter, Restarter, RESTART_EXIT_CODE};
pub use store::{FileStore, MemoryStore, PersistStore};
pub use telemetry::TelemetryProducer;
pub use watchdog::{SoftwareWatchdog, Watchdog, WatchdogHandle};
