// ============================================
// File: crates/decada-common/src/lib.rs
// ============================================
//! # DECADA Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types and utilities shared across all agent
//! crates, ensuring the device identity and timestamps are represented
//! the same way everywhere.
//!
//! ## Main Functionality
//! - [`types`]: Device UUID and secret-bearing credential types
//! - [`time`]: Clock abstraction and atomic timestamps
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               decada-agent                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   decada-core          decada-transport            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             decada-common  ◄── You are here       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - Secret-bearing types must implement Zeroize and redact `Debug`
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use time::{Clock, ManualClock, SystemClock};
pub use types::{AccessToken, DeviceSecret, DeviceUuid};
