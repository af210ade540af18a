// ============================================
// File: crates/decada-agent/src/provisioning/certificate.rs
// ============================================
//! # Certificate Issuance
//!
//! ## Creation Reason
//! Obtains the client certificate the session presents to the broker.
//! Every request starts from a brand-new key pair; nothing from a failed
//! attempt is reused.
//!
//! ## Main Functionality
//! - `CertificateAuthority`: Signs a CSR (the cloud client in production)
//! - `CertificateIssuer::request_certificate()`: key pair, CSR, signing
//! - `IssuedCertificate`: Certificate plus private key, installable once
//!
//! ## Issuance Sequence
//! ```text
//! feed ─► generate_keypair (blocking pool) ─► feed ─► build_csr
//!                                                       │
//!                     None ◄── failure ─────────────────┤
//!                                                       ▼
//!          feed ─► CertificateAuthority::sign_csr ─► feed
//!                                                       │
//!                     None ◄── missing cert/certSN ─────┤
//!                                                       ▼
//!                    persist cert + serial ─► Some(IssuedCertificate)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `request_certificate` never retries; the boot sequence decides
//! - The private key only leaves `IssuedCertificate::install`
//!
//! ## Last Modified
//! v0.1.0 - Initial certificate issuance

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use decada_common::{Clock, DeviceUuid};
use decada_core::crypto::{
    build_csr, BaseSubject, IdentityGenerator, IdentityKeyPair, KeyAlgorithm, SubjectName,
    DRBG_SEED_LEN,
};
use decada_transport::{CredentialKind, CredentialStore, EntropySource, SecTag};

use crate::error::{AgentError, Result};
use crate::services::store::{PersistStore, KEY_CLIENT_CERT, KEY_CLIENT_CERT_SN};
use crate::services::watchdog::WatchdogHandle;

/// Certificate returned by a successful signing exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificate {
    /// Certificate (PEM).
    pub certificate: String,
    /// Serial number.
    pub serial_number: String,
}

/// Signs certificate requests.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Submits `csr_pem` for a certificate valid `valid_days`. `None` on
    /// any failure or incomplete response.
    async fn sign_csr(&self, csr_pem: &str, valid_days: u32) -> Option<SignedCertificate>;
}

/// A signed certificate and the private key it certifies.
pub struct IssuedCertificate {
    /// Signed certificate.
    pub signed: SignedCertificate,
    private_key_pem: Zeroizing<String>,
}

impl IssuedCertificate {
    /// Writes certificate and key into slot `tag` of `store`, consuming
    /// the key.
    ///
    /// # Errors
    /// Returns `Transport(Credential)` if either slot rejects the value.
    pub fn install(self, store: &CredentialStore, tag: SecTag) -> Result<()> {
        store.install(tag, CredentialKind::ClientCertificate, self.signed.certificate.as_str())?;
        store.install(tag, CredentialKind::PrivateKey, self.private_key_pem.as_str())?;
        info!(tag, serial = %self.signed.serial_number, "Client credentials installed");
        Ok(())
    }
}

impl fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("serial_number", &self.signed.serial_number)
            .field("private_key_pem", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// A generated key pair and its CSR.
pub struct CsrBundle {
    /// PEM CSR.
    pub csr_pem: String,
    /// Subject the CSR was built for.
    pub subject: SubjectName,
    keypair: IdentityKeyPair,
}

impl CsrBundle {
    /// Key pair the CSR was built from.
    #[must_use]
    pub const fn keypair(&self) -> &IdentityKeyPair {
        &self.keypair
    }
}

impl fmt::Debug for CsrBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrBundle")
            .field("subject", &self.subject.to_string())
            .finish_non_exhaustive()
    }
}

/// Settings for certificate requests.
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    /// Key algorithm.
    pub algorithm: KeyAlgorithm,
    /// Fixed part of the subject.
    pub subject: BaseSubject,
    /// Requested validity.
    pub valid_days: u32,
}

/// Produces fresh key pairs and CSRs and has them signed.
pub struct CertificateIssuer {
    authority: Arc<dyn CertificateAuthority>,
    generator: Arc<Mutex<IdentityGenerator>>,
    settings: IssuerSettings,
    uuid: DeviceUuid,
    clock: Arc<dyn Clock>,
    store: Arc<dyn PersistStore>,
}

impl CertificateIssuer {
    /// Creates an issuer whose key generator is seeded from `entropy`.
    ///
    /// # Errors
    /// Returns `Transport(Entropy)` if the entropy source fails.
    pub fn new(
        authority: Arc<dyn CertificateAuthority>,
        entropy: &dyn EntropySource,
        settings: IssuerSettings,
        uuid: DeviceUuid,
        clock: Arc<dyn Clock>,
        store: Arc<dyn PersistStore>,
    ) -> Result<Self> {
        let mut seed = Zeroizing::new([0u8; DRBG_SEED_LEN]);
        entropy.fill_random(seed.as_mut_slice())?;
        let generator = IdentityGenerator::from_seed(&seed, settings.algorithm);
        debug!(algorithm = %settings.algorithm, "Identity generator seeded");

        Ok(Self {
            authority,
            generator: Arc::new(Mutex::new(generator)),
            settings,
            uuid,
            clock,
            store,
        })
    }

    /// Generates a fresh key pair and a CSR for it, feeding `watchdog`
    /// before and after key generation.
    ///
    /// # Errors
    /// Returns `Core` if key generation or CSR construction fails.
    pub async fn generate_csr(&self, watchdog: &WatchdogHandle) -> Result<CsrBundle> {
        watchdog.feed();
        let generator = Arc::clone(&self.generator);
        let keypair = tokio::task::spawn_blocking(move || generator.lock().generate_keypair())
            .await
            .map_err(|e| AgentError::internal(format!("key generation task: {e}")))??;
        watchdog.feed();

        let subject = SubjectName::for_device(
            self.settings.subject.clone(),
            &self.uuid,
            self.clock.now_ms(),
        );
        let csr_pem = build_csr(&keypair, &subject)?;
        debug!(subject = %subject, "CSR built");

        Ok(CsrBundle {
            csr_pem,
            subject,
            keypair,
        })
    }

    /// Runs one issuance attempt. `None` means no valid certificate.
    pub async fn request_certificate(&self, watchdog: &WatchdogHandle) -> Option<IssuedCertificate> {
        let bundle = match self.generate_csr(watchdog).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(error = %e, "CSR generation failed");
                return None;
            }
        };

        watchdog.feed();
        let signed = self
            .authority
            .sign_csr(&bundle.csr_pem, self.settings.valid_days)
            .await;
        watchdog.feed();

        let Some(signed) = signed else {
            warn!("No valid certificate received");
            return None;
        };

        self.persist(&signed).await;

        Some(IssuedCertificate {
            signed,
            private_key_pem: bundle.keypair.into_private_key_pem(),
        })
    }

    async fn persist(&self, signed: &SignedCertificate) {
        let result = async {
            self.store
                .set(KEY_CLIENT_CERT, signed.certificate.as_bytes())
                .await?;
            self.store
                .set(KEY_CLIENT_CERT_SN, signed.serial_number.as_bytes())
                .await
        }
        .await;
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist issued certificate");
        }
    }
}

impl fmt::Debug for CertificateIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateIssuer")
            .field("uuid", &self.uuid)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
