// ============================================
// File: crates/decada-core/src/crypto/csr.rs
// ============================================
//! # Certificate Signing Request Builder
//!
//! ## Creation Reason
//! Produces the PKCS#10 request submitted to the cloud certificate
//! endpoint. The subject common name binds the device UUID to the
//! millisecond timestamp of the attempt, so every request is unique.
//!
//! ## Main Functionality
//! - `BaseSubject`: Fixed organisational part of the subject DN
//! - `SubjectName`: Base DN plus `CN = <uuid><timestamp_ms>`
//! - `build_csr()`: SHA-256 signed, PEM-encoded CSR with a critical
//!   key-usage extension asserting `digitalSignature`
//!
//! ## Request Layout
//! ```text
//! CertificationRequestInfo
//! ├─ subject   C=SG, ST=Singapore, L=Singapore, O=DECADA,
//! │            OU=DECADA CA, CN=<uuid><timestamp_ms>
//! ├─ spki      device public key (RSA-2048 or P-256)
//! └─ attrs     extensionRequest { keyUsage (critical): digitalSignature }
//! signature    sha256WithRSAEncryption | ecdsa-with-SHA256
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - rcgen refuses `key_usages` in CSRs, so key usage is written as a raw
//!   extension (OID 2.5.29.15, BIT STRING 0x80)
//! - A failed build is not fatal; callers start over with a new key pair
//!
//! ## Last Modified
//! v0.1.0 - Initial CSR builder

use std::fmt;

use rcgen::{CertificateParams, CustomExtension, DistinguishedName, DnType, KeyPair};
use serde::{Deserialize, Serialize};
use tracing::debug;

use decada_common::types::DeviceUuid;

use super::keys::IdentityKeyPair;
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// X.520 upper bound for `commonName`.
pub const MAX_COMMON_NAME_LEN: usize = 64;

/// X.520 upper bound for `organizationName` / `organizationalUnitName`.
pub const MAX_ORGANIZATION_LEN: usize = 64;

/// X.520 upper bound for `stateOrProvinceName` / `localityName`.
pub const MAX_LOCALITY_LEN: usize = 128;

/// OID of the X.509 key usage extension.
const OID_KEY_USAGE: &[u64] = &[2, 5, 29, 15];

/// DER BIT STRING with only `digitalSignature` (bit 0) set.
const KEY_USAGE_DIGITAL_SIGNATURE: [u8; 4] = [0x03, 0x02, 0x07, 0x80];

// ============================================
// BaseSubject
// ============================================

/// Organisational part of the CSR subject, identical for every device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseSubject {
    /// Country (two-letter code).
    #[serde(default = "default_country")]
    pub country: String,
    /// State or province.
    #[serde(default = "default_state")]
    pub state: String,
    /// Locality.
    #[serde(default = "default_locality")]
    pub locality: String,
    /// Organization.
    #[serde(default = "default_organization")]
    pub organization: String,
    /// Organizational unit.
    #[serde(default = "default_organizational_unit")]
    pub organizational_unit: String,
}

fn default_country() -> String {
    "SG".into()
}

fn default_state() -> String {
    "Singapore".into()
}

fn default_locality() -> String {
    "Singapore".into()
}

fn default_organization() -> String {
    "DECADA".into()
}

fn default_organizational_unit() -> String {
    "DECADA CA".into()
}

impl Default for BaseSubject {
    fn default() -> Self {
        Self {
            country: default_country(),
            state: default_state(),
            locality: default_locality(),
            organization: default_organization(),
            organizational_unit: default_organizational_unit(),
        }
    }
}

impl BaseSubject {
    /// Validates field lengths against X.520 upper bounds.
    ///
    /// # Errors
    /// Returns `InvalidSubject` naming the first offending attribute.
    pub fn validate(&self) -> Result<()> {
        if self.country.len() != 2 || !self.country.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(CoreError::invalid_subject("country must be a two-letter code"));
        }
        check_len("state", &self.state, MAX_LOCALITY_LEN)?;
        check_len("locality", &self.locality, MAX_LOCALITY_LEN)?;
        check_len("organization", &self.organization, MAX_ORGANIZATION_LEN)?;
        check_len("organizational_unit", &self.organizational_unit, MAX_ORGANIZATION_LEN)?;
        Ok(())
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() {
        return Err(CoreError::invalid_subject(format!("{field} is empty")));
    }
    if value.chars().count() > max {
        return Err(CoreError::invalid_subject(format!(
            "{field} exceeds {max} characters"
        )));
    }
    Ok(())
}

// ============================================
// SubjectName
// ============================================

/// Complete subject distinguished name for one CSR attempt.
///
/// # Example
/// ```
/// use decada_common::types::DeviceUuid;
/// use decada_core::crypto::{BaseSubject, SubjectName};
///
/// let uuid = DeviceUuid::from_words([0x0a1b_2c3d, 0x4e5f_6071, 0x8293_a4b5]);
/// let subject = SubjectName::for_device(BaseSubject::default(), &uuid, 1_700_000_000_000);
/// assert_eq!(subject.common_name(), "0a1b2c3d4e5f60718293a4b51700000000000");
/// assert!(subject.to_string().ends_with("CN=0a1b2c3d4e5f60718293a4b51700000000000"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectName {
    base: BaseSubject,
    common_name: String,
}

impl SubjectName {
    /// Builds the subject `<base DN>, CN=<uuid><timestamp_ms>`.
    #[must_use]
    pub fn for_device(base: BaseSubject, uuid: &DeviceUuid, timestamp_ms: u64) -> Self {
        Self {
            base,
            common_name: format!("{uuid}{timestamp_ms}"),
        }
    }

    /// Builds a subject with an explicit common name.
    #[must_use]
    pub fn with_common_name(base: BaseSubject, common_name: impl Into<String>) -> Self {
        Self {
            base,
            common_name: common_name.into(),
        }
    }

    /// Returns the common name.
    #[must_use]
    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// Validates every attribute.
    ///
    /// # Errors
    /// Returns `InvalidSubject` if any attribute is empty or too long.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        check_len("common_name", &self.common_name, MAX_COMMON_NAME_LEN)
    }

    fn to_distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CountryName, self.base.country.as_str());
        dn.push(DnType::StateOrProvinceName, self.base.state.as_str());
        dn.push(DnType::LocalityName, self.base.locality.as_str());
        dn.push(DnType::OrganizationName, self.base.organization.as_str());
        dn.push(
            DnType::OrganizationalUnitName,
            self.base.organizational_unit.as_str(),
        );
        dn.push(DnType::CommonName, self.common_name.as_str());
        dn
    }
}

impl fmt::Display for SubjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C={}, ST={}, L={}, O={}, OU={}, CN={}",
            self.base.country,
            self.base.state,
            self.base.locality,
            self.base.organization,
            self.base.organizational_unit,
            self.common_name
        )
    }
}

// ============================================
// build_csr
// ============================================

/// Builds a PEM-encoded PKCS#10 request for `keypair` and `subject`.
///
/// # Errors
/// - `InvalidSubject` if the subject fails validation
/// - `CsrGeneration` if the key cannot be loaded or the request cannot
///   be signed or serialized
pub fn build_csr(keypair: &IdentityKeyPair, subject: &SubjectName) -> Result<String> {
    subject.validate()?;

    let key_pair = KeyPair::from_pkcs8_pem_and_sign_algo(
        keypair.private_key_pem(),
        keypair.algorithm().signature_algorithm(),
    )
    .map_err(|e| CoreError::csr(format!("load key: {e}")))?;

    let mut params = CertificateParams::default();
    params.distinguished_name = subject.to_distinguished_name();

    let mut key_usage =
        CustomExtension::from_oid_content(OID_KEY_USAGE, KEY_USAGE_DIGITAL_SIGNATURE.to_vec());
    key_usage.set_criticality(true);
    params.custom_extensions.push(key_usage);

    let request = params
        .serialize_request(&key_pair)
        .map_err(|e| CoreError::csr(format!("sign request: {e}")))?;
    let pem = request
        .pem()
        .map_err(|e| CoreError::csr(format!("pem encode: {e}")))?;

    debug!(
        algorithm = %keypair.algorithm(),
        cn = subject.common_name(),
        "Built certificate signing request"
    );
    Ok(pem)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use x509_parser::prelude::*;

    use super::*;
    use crate::crypto::keys::{IdentityGenerator, KeyAlgorithm};

    fn uuid() -> DeviceUuid {
        DeviceUuid::from_words([0x0a1b_2c3d, 0x4e5f_6071, 0x8293_a4b5])
    }

    fn parse_and_check(pem_text: &str, pair: &IdentityKeyPair, expected_cn: &str) {
        let (_, pem) = x509_parser::pem::parse_x509_pem(pem_text.as_bytes()).unwrap();
        assert_eq!(pem.label, "CERTIFICATE REQUEST");

        let (_, csr) = X509CertificationRequest::from_der(&pem.contents).unwrap();
        let info = &csr.certification_request_info;

        assert_eq!(info.subject_pki.raw, pair.public_key_der());
        assert!(info.subject.to_string().contains(&format!("CN={expected_cn}")));
        assert!(info.subject.to_string().contains("O=DECADA"));

        let has_digital_signature = csr
            .requested_extensions()
            .unwrap()
            .any(|ext| matches!(ext, ParsedExtension::KeyUsage(ku) if ku.digital_signature()));
        assert!(has_digital_signature);

        csr.verify_signature().unwrap();
    }

    #[test]
    fn test_csr_embeds_p256_public_key() {
        let mut generator = IdentityGenerator::from_seed(&[9u8; 32], KeyAlgorithm::EcdsaP256);
        let pair = generator.generate_keypair().unwrap();
        let subject = SubjectName::for_device(BaseSubject::default(), &uuid(), 1_700_000_000_000);

        let pem = build_csr(&pair, &subject).unwrap();
        parse_and_check(&pem, &pair, "0a1b2c3d4e5f60718293a4b51700000000000");
    }

    #[test]
    fn test_csr_embeds_rsa_public_key() {
        let mut generator = IdentityGenerator::from_seed(&[10u8; 32], KeyAlgorithm::Rsa2048);
        let pair = generator.generate_keypair().unwrap();
        let subject = SubjectName::for_device(BaseSubject::default(), &uuid(), 1_700_000_000_123);

        let pem = build_csr(&pair, &subject).unwrap();
        parse_and_check(&pem, &pair, "0a1b2c3d4e5f60718293a4b51700000000123");
    }

    #[test]
    fn test_empty_common_name_rejected() {
        let mut generator = IdentityGenerator::from_seed(&[11u8; 32], KeyAlgorithm::EcdsaP256);
        let pair = generator.generate_keypair().unwrap();
        let subject = SubjectName::with_common_name(BaseSubject::default(), "");

        let err = build_csr(&pair, &subject).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSubject { .. }));
    }

    #[test]
    fn test_overlong_common_name_rejected() {
        let subject = SubjectName::with_common_name(BaseSubject::default(), "x".repeat(65));
        assert!(subject.validate().is_err());

        let subject = SubjectName::with_common_name(BaseSubject::default(), "x".repeat(64));
        assert!(subject.validate().is_ok());
    }

    #[test]
    fn test_base_subject_validation() {
        let mut base = BaseSubject::default();
        assert!(base.validate().is_ok());

        base.country = "SGP".into();
        assert!(base.validate().is_err());

        let mut base = BaseSubject::default();
        base.organization = String::new();
        assert!(base.validate().is_err());
    }

    #[test]
    fn test_subject_display() {
        let subject = SubjectName::with_common_name(BaseSubject::default(), "device");
        assert_eq!(
            subject.to_string(),
            "C=SG, ST=Singapore, L=Singapore, O=DECADA, OU=DECADA CA, CN=device"
        );
    }
}
