// ============================================
// File: crates/decada-transport/src/credentials.rs
// ============================================
//! # Credential Slots
//!
//! ## Creation Reason
//! The secure transport references certificates and keys by numeric
//! security tag rather than by value. This module models those slots:
//! provisioning writes into them, socket configuration reads from them.
//!
//! ## Slot Layout
//! ```text
//! ┌──────────────────┬──────────────────────────────────────┐
//! │ tag 1 (CA)       │ CaCertificate                        │
//! │ tag 2 (client)   │ ClientCertificate, PrivateKey        │
//! └──────────────────┴──────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The private key slot is write-once per boot; a second write is an
//!   error, never a silent overwrite
//! - Stored PEM is zeroized when the store is dropped
//!
//! ## Last Modified
//! v0.1.0 - Initial credential store

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Result, TransportError};

// ============================================
// Tags
// ============================================

/// Numeric security tag naming a credential group.
pub type SecTag = u32;

/// Tag holding the broker CA certificate.
pub const CA_CERTS_TAG: SecTag = 1;

/// Tag holding the client certificate and private key.
pub const CLIENT_CERTS_TAG: SecTag = 2;

/// What a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Trusted CA certificate (PEM).
    CaCertificate,
    /// Client certificate (PEM).
    ClientCertificate,
    /// Client private key (PKCS#8 PEM).
    PrivateKey,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaCertificate => f.write_str("ca-certificate"),
            Self::ClientCertificate => f.write_str("client-certificate"),
            Self::PrivateKey => f.write_str("private-key"),
        }
    }
}

// ============================================
// TlsCredentials
// ============================================

/// Credentials resolved for one socket configuration.
#[derive(Clone)]
pub struct TlsCredentials {
    /// CA certificate PEM.
    pub ca_cert_pem: String,
    /// Client certificate PEM, for mutual TLS.
    pub client_cert_pem: Option<String>,
    /// Client private key PEM, for mutual TLS.
    pub client_key_pem: Option<Zeroizing<String>>,
}

impl TlsCredentials {
    /// Server-authenticated only.
    #[must_use]
    pub fn server_only(ca_cert_pem: impl Into<String>) -> Self {
        Self {
            ca_cert_pem: ca_cert_pem.into(),
            client_cert_pem: None,
            client_key_pem: None,
        }
    }

    /// Returns `true` if both halves of the client identity are present.
    #[must_use]
    pub fn has_client_identity(&self) -> bool {
        self.client_cert_pem.is_some() && self.client_key_pem.is_some()
    }
}

impl fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("ca_cert_len", &self.ca_cert_pem.len())
            .field("client_cert", &self.client_cert_pem.as_ref().map(String::len))
            .field("client_key", &self.client_key_pem.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ============================================
// CredentialStore
// ============================================

/// In-process credential slots.
///
/// # Thread Safety
/// Interior `RwLock`; share behind an `Arc`.
#[derive(Default)]
pub struct CredentialStore {
    slots: RwLock<HashMap<(SecTag, CredentialKind), Zeroizing<String>>>,
}

impl CredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `pem` into slot (`tag`, `kind`).
    ///
    /// # Errors
    /// - `Credential` if `pem` is empty
    /// - `Credential` if a private key is already installed under `tag`
    pub fn install(&self, tag: SecTag, kind: CredentialKind, pem: impl Into<String>) -> Result<()> {
        let pem = Zeroizing::new(pem.into());
        if pem.trim().is_empty() {
            return Err(TransportError::credential(format!(
                "empty {kind} for tag {tag}"
            )));
        }

        let mut slots = self.slots.write();
        if kind == CredentialKind::PrivateKey && slots.contains_key(&(tag, kind)) {
            return Err(TransportError::credential(format!(
                "private key for tag {tag} already installed"
            )));
        }
        slots.insert((tag, kind), pem);
        debug!(tag, %kind, "Credential installed");
        Ok(())
    }

    /// Returns `true` if slot (`tag`, `kind`) is populated.
    #[must_use]
    pub fn contains(&self, tag: SecTag, kind: CredentialKind) -> bool {
        self.slots.read().contains_key(&(tag, kind))
    }

    /// Reads a slot.
    #[must_use]
    pub fn get(&self, tag: SecTag, kind: CredentialKind) -> Option<Zeroizing<String>> {
        self.slots.read().get(&(tag, kind)).cloned()
    }

    /// Resolves the credentials a socket configured with `ca_tag` and
    /// optional `client_tag` would use.
    ///
    /// # Errors
    /// - `Credential` if the CA slot is empty
    /// - `Credential` if `client_tag` is given but its certificate or key
    ///   is missing
    pub fn tls_credentials(&self, ca_tag: SecTag, client_tag: Option<SecTag>) -> Result<TlsCredentials> {
        let slots = self.slots.read();
        let ca = slots
            .get(&(ca_tag, CredentialKind::CaCertificate))
            .ok_or_else(|| TransportError::credential(format!("no CA certificate for tag {ca_tag}")))?;

        let mut credentials = TlsCredentials::server_only(ca.as_str());

        if let Some(tag) = client_tag {
            let cert = slots
                .get(&(tag, CredentialKind::ClientCertificate))
                .ok_or_else(|| TransportError::credential(format!("no client certificate for tag {tag}")))?;
            let key = slots
                .get(&(tag, CredentialKind::PrivateKey))
                .ok_or_else(|| TransportError::credential(format!("no private key for tag {tag}")))?;
            credentials.client_cert_pem = Some(cert.to_string());
            credentials.client_key_pem = Some(key.clone());
        }

        Ok(credentials)
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let mut keys: Vec<_> = slots.keys().collect();
        keys.sort_by_key(|(tag, kind)| (*tag, kind.to_string()));
        f.debug_struct("CredentialStore").field("slots", &keys).finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_and_resolve() {
        let store = CredentialStore::new();
        store.install(CA_CERTS_TAG, CredentialKind::CaCertificate, "CA").unwrap();
        store.install(CLIENT_CERTS_TAG, CredentialKind::ClientCertificate, "CERT").unwrap();
        store.install(CLIENT_CERTS_TAG, CredentialKind::PrivateKey, "KEY").unwrap();

        let creds = store.tls_credentials(CA_CERTS_TAG, Some(CLIENT_CERTS_TAG)).unwrap();
        assert_eq!(creds.ca_cert_pem, "CA");
        assert_eq!(creds.client_cert_pem.as_deref(), Some("CERT"));
        assert_eq!(creds.client_key_pem.as_deref().map(String::as_str), Some("KEY"));
        assert!(creds.has_client_identity());
    }

    #[test]
    fn test_private_key_write_once() {
        let store = CredentialStore::new();
        store.install(CLIENT_CERTS_TAG, CredentialKind::PrivateKey, "KEY1").unwrap();
        let err = store
            .install(CLIENT_CERTS_TAG, CredentialKind::PrivateKey, "KEY2")
            .unwrap_err();
        assert!(matches!(err, TransportError::Credential { .. }));
        assert_eq!(
            store.get(CLIENT_CERTS_TAG, CredentialKind::PrivateKey).unwrap().as_str(),
            "KEY1"
        );
    }

    #[test]
    fn test_certificates_can_be_replaced() {
        let store = CredentialStore::new();
        store.install(CA_CERTS_TAG, CredentialKind::CaCertificate, "A").unwrap();
        store.install(CA_CERTS_TAG, CredentialKind::CaCertificate, "B").unwrap();
        assert_eq!(store.get(CA_CERTS_TAG, CredentialKind::CaCertificate).unwrap().as_str(), "B");
    }

    #[test]
    fn test_missing_slots() {
        let store = CredentialStore::new();
        assert!(store.tls_credentials(CA_CERTS_TAG, None).is_err());
        store.install(CA_CERTS_TAG, CredentialKind::CaCertificate, "CA").unwrap();
        assert!(store.tls_credentials(CA_CERTS_TAG, None).is_ok());
        assert!(store.tls_credentials(CA_CERTS_TAG, Some(CLIENT_CERTS_TAG)).is_err());
        assert!(store.install(CA_CERTS_TAG, CredentialKind::CaCertificate, "  ").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let store = CredentialStore::new();
        store.install(CA_CERTS_TAG, CredentialKind::CaCertificate, "CA").unwrap();
        store.install(CLIENT_CERTS_TAG, CredentialKind::ClientCertificate, "CERT").unwrap();
        store.install(CLIENT_CERTS_TAG, CredentialKind::PrivateKey, "TOPSECRET").unwrap();
        let creds = store.tls_credentials(CA_CERTS_TAG, Some(CLIENT_CERTS_TAG)).unwrap();
        assert!(!format!("{creds:?}").contains("TOPSECRET"));
        assert!(!format!("{store:?}").contains("TOPSECRET"));
    }
}
