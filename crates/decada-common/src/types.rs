// ============================================
// File: crates/decada-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the identity and credential types that flow between the
//! provisioning, registration and session layers, so that the device UUID
//! format is enforced once and secrets never end up in logs.
//!
//! ## Main Functionality
//! - `DeviceUuid`: 96-bit hardware identifier rendered as 24 hex characters
//! - `DeviceSecret`: Cloud-assigned secret, zeroized on drop
//! - `AccessToken`: Short-lived REST bearer credential, zeroized on drop
//!
//! ## Main Logical Flow
//! 1. `DeviceUuid` is derived once at boot from the factory UID words
//! 2. `AccessToken` is fetched per REST call and dropped right after
//! 3. `DeviceSecret` is obtained by registration and kept for the session
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Debug` for the secret types is redacted; use `expose()` deliberately
//! - Every UID word is zero-padded to 8 digits, not only the first
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Number of 32-bit words in the factory unique ID.
pub const UID_WORDS: usize = 3;

/// Length of the rendered device UUID (3 words x 8 hex digits).
pub const DEVICE_UUID_LEN: usize = UID_WORDS * 8;

// ============================================
// DeviceUuid
// ============================================

/// Immutable device identifier derived from the 96-bit factory UID.
///
/// # Format
/// ```text
/// ┌──────────┬──────────┬──────────┐
/// │  word 0  │  word 1  │  word 2  │
/// │ %08x     │ %08x     │ %08x     │
/// └──────────┴──────────┴──────────┘
///        24 lowercase hex characters
/// ```
///
/// # Example
/// ```
/// use decada_common::types::DeviceUuid;
///
/// let uuid = DeviceUuid::from_words([0x0a1b_2c3d, 0x4e5f_6071, 0x8293_a4b5]);
/// assert_eq!(uuid.as_str(), "0a1b2c3d4e5f60718293a4b5");
///
/// let padded = DeviceUuid::from_words([1, 2, 3]);
/// assert_eq!(padded.as_str(), "000000010000000200000003");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceUuid(String);

impl DeviceUuid {
    /// Renders the three UID words as a device UUID.
    #[must_use]
    pub fn from_words(words: [u32; UID_WORDS]) -> Self {
        Self(format!("{:08x}{:08x}{:08x}", words[0], words[1], words[2]))
    }

    /// Derives a UUID from raw identifier bytes (for example a host
    /// `machine-id` decoded from hex). Only the first 12 bytes are used.
    ///
    /// # Errors
    /// Returns `InvalidLength` if fewer than 12 bytes are supplied.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CommonError> {
        if bytes.len() < UID_WORDS * 4 {
            return Err(CommonError::invalid_length(UID_WORDS * 4, bytes.len()));
        }
        let mut words = [0u32; UID_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Self::from_words(words))
    }

    /// Derives a UUID from the hex text of a host `machine-id` file.
    ///
    /// # Errors
    /// Returns `MalformedId` if the text is not hex, or `InvalidLength`
    /// if it decodes to fewer than 12 bytes.
    pub fn from_machine_id(text: &str) -> Result<Self, CommonError> {
        let bytes = hex::decode(text.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Returns the UUID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceUuid({})", self.0)
    }
}

impl FromStr for DeviceUuid {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DEVICE_UUID_LEN {
            return Err(CommonError::invalid_input(
                "device_uuid",
                format!("expected {DEVICE_UUID_LEN} hex characters, got {}", s.len()),
            ));
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(CommonError::invalid_input(
                "device_uuid",
                "must be lowercase hexadecimal",
            ));
        }
        Ok(Self(s.to_owned()))
    }
}

impl TryFrom<String> for DeviceUuid {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceUuid> for String {
    fn from(uuid: DeviceUuid) -> Self {
        uuid.0
    }
}

// ============================================
// DeviceSecret
// ============================================

/// Cloud-assigned device secret.
///
/// Held for the lifetime of the session and used only to derive the
/// session password. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct DeviceSecret(String);

impl Drop for DeviceSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl DeviceSecret {
    /// Wraps a secret string.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeviceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceSecret([REDACTED])")
    }
}

// ============================================
// AccessToken
// ============================================

/// Short-lived bearer credential for the cloud REST API.
///
/// Fetched fresh for every API call and never cached.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct AccessToken(String);

impl Drop for AccessToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl AccessToken {
    /// Wraps a token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_pads_every_word() {
        let uuid = DeviceUuid::from_words([0xab, 0x1, 0xffff_ffff]);
        assert_eq!(uuid.as_str(), "000000ab00000001ffffffff");
        assert_eq!(uuid.as_str().len(), DEVICE_UUID_LEN);
    }

    #[test]
    fn test_uuid_from_bytes() {
        let bytes = [0x0a, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f, 0x60, 0x71, 0x82, 0x93, 0xa4, 0xb5, 0xff];
        let uuid = DeviceUuid::from_bytes(&bytes).unwrap();
        assert_eq!(uuid.as_str(), "0a1b2c3d4e5f60718293a4b5");

        assert!(DeviceUuid::from_bytes(&bytes[..11]).is_err());
    }

    #[test]
    fn test_uuid_from_machine_id() {
        let uuid = DeviceUuid::from_machine_id("0a1b2c3d4e5f60718293a4b5c6d7e8f9\n").unwrap();
        assert_eq!(uuid.as_str(), "0a1b2c3d4e5f60718293a4b5");

        assert!(matches!(
            DeviceUuid::from_machine_id("not-hex"),
            Err(CommonError::MalformedId { .. })
        ));
        assert!(matches!(
            DeviceUuid::from_machine_id("0a1b2c3d"),
            Err(CommonError::InvalidLength { expected: 12, actual: 4 })
        ));
    }

    #[test]
    fn test_uuid_parse_validation() {
        assert!("0a1b2c3d4e5f60718293a4b5".parse::<DeviceUuid>().is_ok());
        assert!("0a1b2c3d".parse::<DeviceUuid>().is_err());
        assert!("0A1B2C3D4E5F60718293A4B5".parse::<DeviceUuid>().is_err());
        assert!("0a1b2c3d4e5f60718293a4bz".parse::<DeviceUuid>().is_err());
    }

    #[test]
    fn test_uuid_serde() {
        let uuid = DeviceUuid::from_words([1, 2, 3]);
        let json = serde_json::to_string(&uuid).unwrap();
        assert_eq!(json, "\"000000010000000200000003\"");
        let back: DeviceUuid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uuid);
        assert!(serde_json::from_str::<DeviceUuid>("\"nope\"").is_err());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = DeviceSecret::new("super-secret");
        let token = AccessToken::new("bearer-value");
        assert!(!format!("{secret:?}").contains("super-secret"));
        assert!(!format!("{token:?}").contains("bearer-value"));
        assert_eq!(secret.expose(), "super-secret");
        assert_eq!(token.expose(), "bearer-value");
    }

    #[test]
    fn test_secrets_zeroize() {
        let mut secret = DeviceSecret::new("super-secret");
        let mut token = AccessToken::new("bearer-value");
        secret.zeroize();
        token.zeroize();
        assert!(secret.expose().is_empty());
        assert!(token.expose().is_empty());
    }
}
