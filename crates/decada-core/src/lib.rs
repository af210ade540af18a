// ============================================
// File: crates/decada-core/src/lib.rs
// ============================================
//! # DECADA Core - Identity, Signing & Session Protocol
//!
//! ## Creation Reason
//! Provides the pure building blocks of provisioning: device key pairs,
//! certificate signing requests, request signatures, and the session
//! wire protocol. Nothing in this crate performs I/O.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - `IdentityGenerator` / `IdentityKeyPair`: fresh key pair per attempt
//! - `build_csr`: PEM PKCS#10 with SHA-256 and digital-signature usage
//! - `sign` and friends: SHA-256 request authentication
//!
//! ### Protocol Module ([`protocol`])
//! - MQTT 3.1.1 control packets and codec
//! - Command / acknowledgment / telemetry envelopes
//! - Topic naming
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               decada-agent                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   decada-core  ◄──     decada-transport            │
//! │   You are here                │                    │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             decada-common                          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto / rcgen implementations
//! - NEVER implement custom crypto primitives
//! - Signature concatenation order is a wire contract; keep the golden
//!   vectors passing
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use crypto::{
    build_csr, BaseSubject, IdentityGenerator, IdentityKeyPair, KeyAlgorithm, RequestParams,
    SubjectName,
};
pub use error::{CoreError, Result};
pub use protocol::{
    CommandAck, CommandEnvelope, MeasurepointPost, Packet, PacketCodec, Publish, TopicSet,
};
