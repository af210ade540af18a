// ============================================
// File: crates/decada-agent/src/provisioning/mod.rs
// ============================================
//! # Provisioning
//!
//! ## Creation Reason
//! Everything that happens against the cloud REST API before the session
//! can start: obtaining a signed client certificate and the device secret.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`client`]: Signed REST client (`CloudClient`)
//! - [`registration`]: Create-or-fetch device workflow
//! - [`certificate`]: Key pair, CSR and certificate issuance
//! - [`models`]: Request/response bodies
//!
//! ## Dependency Injection
//! ```text
//!                    ┌────────────────────┐
//!                    │    CloudClient     │
//!                    └──┬──────────────┬──┘
//!     impl DeviceRegistry│              │impl CertificateAuthority
//!                       ▼              ▼
//!          DeviceRegistration    CertificateIssuer
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial provisioning module

pub mod certificate;
pub mod client;
pub mod models;
pub mod registration;

pub use certificate::{
    CertificateAuthority, CertificateIssuer, CsrBundle, IssuedCertificate, IssuerSettings,
    SignedCertificate,
};
pub use client::CloudClient;
pub use registration::{DeviceRegistration, DeviceRegistry, RegistrationState};
