// ============================================
// File: crates/decada-agent/src/provisioning/models.rs
// ============================================
//! Cloud API request and response bodies.
//!
//! Every response wraps its payload in a top-level `data` object. Fields
//! are optional so that a partial response deserializes and is then
//! rejected by the caller, rather than failing inside serde.

use serde::{Deserialize, Serialize};

/// Timezone declared for newly created devices.
pub const DEVICE_TIMEZONE: &str = "+08:00";

/// Prefix of the device name registered in the cloud.
pub const DEVICE_NAME_PREFIX: &str = "core-";

/// Common response wrapper.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Operation-specific payload.
    pub data: Option<T>,
}

/// Token request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest<'a> {
    /// Application access key.
    pub app_key: &'a str,
    /// `sha256(access_key + timestamp + access_secret)`.
    pub encryption: &'a str,
    /// Millisecond timestamp used in `encryption`.
    pub timestamp: &'a str,
}

/// Token response payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    /// Bearer token.
    pub access_token: Option<String>,
}

/// Localized device name.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceName<'a> {
    /// Name in the default locale.
    pub default_value: &'a str,
    /// Translations (unused).
    pub i18n_value: &'a str,
}

/// Create-device request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceRequest<'a> {
    /// Product the device belongs to.
    pub product_key: &'a str,
    /// Device timezone.
    pub timezone: &'a str,
    /// Display name.
    pub device_name: DeviceName<'a>,
    /// Device key (the UUID).
    pub device_key: &'a str,
}

/// Device payload of get/create responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceData {
    /// Cloud-assigned device secret.
    pub device_secret: Option<String>,
}

/// Certificate request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest<'a> {
    /// PEM CSR.
    pub csr: &'a str,
    /// Requested validity in days.
    pub valid_day: u32,
    /// Millisecond timestamp of the request.
    pub timestamp: &'a str,
}

/// Certificate response payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateData {
    /// Signed certificate (PEM).
    pub cert: Option<String>,
    /// Serial number.
    #[serde(rename = "certSN")]
    pub cert_sn: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_device_body_shape() {
        let body = CreateDeviceRequest {
            product_key: "pk",
            timezone: DEVICE_TIMEZONE,
            device_name: DeviceName {
                default_value: "core-abc",
                i18n_value: "",
            },
            device_key: "abc",
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"productKey":"pk","timezone":"+08:00","deviceName":{"defaultValue":"core-abc","i18nValue":""},"deviceKey":"abc"}"#
        );
    }

    #[test]
    fn test_certificate_response_partial() {
        let parsed: ApiResponse<CertificateData> =
            serde_json::from_str(r#"{"data":{"cert":"PEM"}}"#).unwrap();
        let data = parsed.data.unwrap();
        assert_eq!(data.cert.as_deref(), Some("PEM"));
        assert!(data.cert_sn.is_none());

        let parsed: ApiResponse<CertificateData> =
            serde_json::from_str(r#"{"data":{"cert":"PEM","certSN":"42"}}"#).unwrap();
        assert_eq!(parsed.data.unwrap().cert_sn.as_deref(), Some("42"));
    }
}
