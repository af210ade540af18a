// ============================================
// File: crates/decada-core/src/crypto/signature.rs
// ============================================
//! # Signed-Request Authenticator
//!
//! ## Creation Reason
//! The cloud API authenticates every REST call, and the broker every
//! connection, with a SHA-256 digest over an exact concatenation of
//! request components followed by a shared secret. The concatenation order
//! is part of the wire contract, so it lives in one place.
//!
//! ## Main Functionality
//! - `sign()`: `hex(SHA-256(c1 || c2 || ... || secret))`
//! - `RequestParams`: Canonical `action` + sorted params + body string
//! - `request_signature()`, `token_encryption()`, `session_password()`
//!
//! ## Canonical Parameter String
//! ```text
//! "action" + <action>
//!   + <name> + <value>   for every other query parameter, ascending by name
//!   + <json body>        when the request carries one
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All functions are pure; timestamps are passed in, never read here
//! - Golden vectors in the tests pin the exact byte order
//!
//! ## Last Modified
//! v0.1.0 - Initial signing helpers

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Signs `components` with `secret`: SHA-256 over the components in the
/// given order followed by the secret, rendered as lowercase hex.
#[must_use]
pub fn sign(secret: &str, components: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for component in components {
        hasher.update(component.as_bytes());
    }
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Signature header value for a REST call:
/// `sign(access_secret, [access_token, canonical_params, timestamp_ms])`.
#[must_use]
pub fn request_signature(
    access_token: &str,
    canonical_params: &str,
    timestamp_ms: &str,
    access_secret: &str,
) -> String {
    sign(access_secret, &[access_token, canonical_params, timestamp_ms])
}

/// `encryption` field of the token request:
/// `sign(access_secret, [access_key, timestamp_ms])`.
#[must_use]
pub fn token_encryption(access_key: &str, timestamp_ms: &str, access_secret: &str) -> String {
    sign(access_secret, &[access_key, timestamp_ms])
}

/// Broker password binding device identity, product and connection
/// timestamp to the device secret.
#[must_use]
pub fn session_password(
    device_key: &str,
    product_key: &str,
    timestamp_ms: &str,
    device_secret: &str,
) -> String {
    sign(
        device_secret,
        &[
            "clientId",
            device_key,
            "deviceKey",
            device_key,
            "productKey",
            product_key,
            "timestamp",
            timestamp_ms,
        ],
    )
}

// ============================================
// RequestParams
// ============================================

/// Query parameters and body of a signed REST call.
///
/// # Example
/// ```
/// use decada_core::crypto::RequestParams;
///
/// let params = RequestParams::new("get")
///     .param("productKey", "pk")
///     .param("orgId", "ou")
///     .param("deviceKey", "dk");
/// assert_eq!(params.canonical(), "actiongetdeviceKeydkorgIdouproductKeypk");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    action: String,
    params: BTreeMap<String, String>,
    body: Option<String>,
}

impl RequestParams {
    /// Starts a parameter set for `action`.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: BTreeMap::new(),
            body: None,
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Attaches the serialized JSON body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the attached body, if any.
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Canonical string fed into [`request_signature`].
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(64);
        out.push_str("action");
        out.push_str(&self.action);
        for (name, value) in &self.params {
            out.push_str(name);
            out.push_str(value);
        }
        if let Some(body) = &self.body {
            out.push_str(body);
        }
        out
    }

    /// Query pairs for the request URL, `action` first.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.params.len() + 1);
        pairs.push(("action".to_owned(), self.action.clone()));
        pairs.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "0a1b2c3d4e5f60718293a4b5";
    const TS: &str = "1700000000000";

    #[test]
    fn test_sha256_known_vectors() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sign_golden_vector() {
        let digest = sign(
            "s3cr3t",
            &["actionget", "deviceKey", UUID, "orgId", "ou-1", "productKey", "pk-1"],
        );
        assert_eq!(
            digest,
            "aba8497b0630ffa18e7a0270f07ea39a4f41992807cd461f6c5ce68e06c51eed"
        );
    }

    #[test]
    fn test_sign_order_matters() {
        let a = sign("s", &["orgId", "ou-1", "deviceKey", UUID]);
        let b = sign("s", &["deviceKey", UUID, "orgId", "ou-1"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_signature_golden_vector() {
        let params = RequestParams::new("get")
            .param("orgId", "ou-1")
            .param("productKey", "pk-1")
            .param("deviceKey", UUID);
        assert_eq!(
            params.canonical(),
            format!("actiongetdeviceKey{UUID}orgIdou-1productKeypk-1")
        );
        assert_eq!(
            request_signature("token-abc", &params.canonical(), TS, "s3cr3t"),
            "bb0c46d3754dbec12a4cbdd2ee64df3a6e516dda145077ccd26b4a07b5c820d7"
        );
    }

    #[test]
    fn test_token_encryption_golden_vector() {
        assert_eq!(
            token_encryption("ak-1", TS, "s3cr3t"),
            "fa81e9da7f7cdd3f07171c3717ce35169a3c6f6d95adbc0d14409dd5fef37a14"
        );
    }

    #[test]
    fn test_session_password_golden_vector() {
        assert_eq!(
            session_password(UUID, "pk-1", TS, "devsecret"),
            "c5056a337c6d2d5eb8387fd0de688148fbaa86467dac51f370a5f60eba46b19c"
        );
    }

    #[test]
    fn test_body_appended_after_params() {
        let params = RequestParams::new("create")
            .param("orgId", "ou-1")
            .body(r#"{"a":1}"#);
        assert_eq!(params.canonical(), r#"actioncreateorgIdou-1{"a":1}"#);
        assert_eq!(params.body_str(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_query_pairs_action_first() {
        let pairs = RequestParams::new("apply")
            .param("productKey", "pk-1")
            .param("deviceKey", UUID)
            .query_pairs();
        assert_eq!(pairs[0], ("action".to_owned(), "apply".to_owned()));
        assert_eq!(pairs[1].0, "deviceKey");
        assert_eq!(pairs[2].0, "productKey");
    }
}
