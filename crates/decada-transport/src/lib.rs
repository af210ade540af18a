// ============================================
// File: crates/decada-transport/src/lib.rs
// ============================================
//! # DECADA Transport - Network Collaborators
//!
//! ## Creation Reason
//! Provides the narrow I/O interfaces the provisioning agent consumes,
//! their production implementations and in-memory mocks.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: Collaborator trait definitions
//! - [`credentials`]: Sec-tag credential slots
//! - [`dns`]: System resolver with bounded retry
//! - [`tls`]: rustls secure sockets
//! - [`http`]: reqwest HTTPS client
//! - [`entropy`]: OS randomness
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               decada-agent                          │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   decada-core          decada-transport            │
//! │                        You are here ◄──            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             decada-common                          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │   Provisioning ──► HttpTransport ──► REST API (HTTPS)    │
//! │                                                          │
//! │   Session ──► Resolver ──► SecureTransport ──► Broker    │
//! │                               ▲                          │
//! │                     CredentialStore (sec tags)           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always use traits for testability
//! - Every network call in here is bounded by a timeout or attempt cap
//! - Mock implementations available with `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod credentials;
pub mod dns;
pub mod entropy;
pub mod error;
pub mod http;
pub mod tls;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export primary types
pub use credentials::{
    CredentialKind, CredentialStore, SecTag, TlsCredentials, CA_CERTS_TAG, CLIENT_CERTS_TAG,
};
pub use dns::DnsResolver;
pub use entropy::OsEntropy;
pub use error::{Result, TransportError};
pub use http::ReqwestTransport;
pub use tls::TlsTransport;
pub use traits::{
    EntropySource, HttpMethod, HttpRequest, HttpResponse, HttpTransport, Resolver, SecureSocket,
    SecureTransport, SocketEndpoint,
};
