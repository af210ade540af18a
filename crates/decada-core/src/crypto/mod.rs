// ============================================
// File: crates/decada-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes the device identity and request-authentication primitives,
//! using audited RustCrypto and rcgen implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: Key pair generation (RSA-2048 or P-256) from a seeded DRBG
//! - [`csr`]: PKCS#10 request construction
//! - [`signature`]: SHA-256 request, token and session-password signing
//!
//! ## Provisioning Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  entropy ──► IdentityGenerator ──► IdentityKeyPair          │
//! │                                        │                    │
//! │            SubjectName(uuid, ts) ──► build_csr ──► PEM CSR  │
//! │                                                     │       │
//! │  RequestParams + token ──► request_signature ──► POST apply │
//! │                                                     │       │
//! │              signed certificate ◄───────────────────┘       │
//! │                                                             │
//! │  uuid + product key + ts + device secret                    │
//! │                      └──► session_password ──► CONNECT      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER roll your own crypto primitives
//! - Private keys stay in `Zeroizing` storage
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod csr;
pub mod keys;
pub mod signature;

pub use csr::{build_csr, BaseSubject, SubjectName};
pub use keys::{IdentityGenerator, IdentityKeyPair, KeyAlgorithm, DRBG_SEED_LEN};
pub use signature::{
    request_signature, session_password, sha256_hex, sign, token_encryption, RequestParams,
};
