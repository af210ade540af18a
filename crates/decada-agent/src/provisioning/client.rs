// ============================================
// File: crates/decada-agent/src/provisioning/client.rs
// ============================================
//! # Cloud API Client
//!
//! ## Creation Reason
//! Talks to the cloud provisioning REST API: access tokens, device
//! lookup and creation, and CSR signing. Every call except the token
//! request is signed with the access secret.
//!
//! ## Main Functionality
//! - `CloudClient::get_access_token()`: unsigned token request, no retry
//! - `DeviceRegistry` implementation: `get_device_secret`, `create_device`
//! - `CertificateAuthority` implementation: `sign_csr`
//!
//! ## Signed Request Flow
//! ```text
//! timestamp_ms ──┐
//! get_access_token() ──► token
//!                │
//! RequestParams(action, params, body).canonical()
//!                │
//!                ▼
//! sha256(token + canonical + timestamp_ms + access_secret)
//!                │
//!                ▼
//! headers: apim-accesstoken, apim-signature, apim-timestamp
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Tokens are fetched fresh for every call and never cached
//! - With a watchdog attached, every HTTP round-trip feeds it first, so
//!   the window only has to cover one request timeout
//! - The body that is signed must be byte-identical to the body sent
//! - Neither the token nor the device secret may appear in logs
//!
//! ## Last Modified
//! v0.1.0 - Initial cloud client

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use decada_common::{AccessToken, Clock, DeviceSecret, DeviceUuid};
use decada_core::crypto::{request_signature, token_encryption, RequestParams};
use decada_transport::{HttpMethod, HttpRequest, HttpTransport};

use super::certificate::{CertificateAuthority, SignedCertificate};
use super::models::{
    ApiResponse, CertificateData, CertificateRequest, CreateDeviceRequest, DeviceData, DeviceName,
    TokenData, TokenRequest, DEVICE_TIMEZONE,
};
use super::registration::DeviceRegistry;
use crate::config::CloudConfig;
use crate::error::{AgentError, Result};
use crate::services::watchdog::WatchdogHandle;

/// Content type of every JSON request.
pub const CONTENT_TYPE_JSON: &str = "application/json;charset=UTF-8";

const HEADER_CONTENT_TYPE: &str = "Content-Type";
const HEADER_ACCESS_TOKEN: &str = "apim-accesstoken";
const HEADER_SIGNATURE: &str = "apim-signature";
const HEADER_TIMESTAMP: &str = "apim-timestamp";

const PATH_TOKEN: &str = "/apim-token-service/v2.0/token/get";
const PATH_DEVICES: &str = "/connect-service/v2.1/devices";
const PATH_CERTIFICATES: &str = "/connect-service/v2.0/certificates";

/// Cloud REST API client for one device.
pub struct CloudClient {
    config: CloudConfig,
    uuid: DeviceUuid,
    http: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    watchdog: Option<WatchdogHandle>,
}

impl CloudClient {
    /// Creates a client acting for device `uuid`.
    pub fn new(
        config: CloudConfig,
        uuid: DeviceUuid,
        http: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            uuid,
            http,
            clock,
            watchdog: None,
        }
    }

    /// Feeds `watchdog` before every HTTP round-trip.
    #[must_use]
    pub fn with_watchdog(mut self, watchdog: WatchdogHandle) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Device this client acts for.
    #[must_use]
    pub const fn uuid(&self) -> &DeviceUuid {
        &self.uuid
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url())
    }

    /// Requests a fresh access token.
    ///
    /// # Errors
    /// Returns `Api` or `Transport` on network failure, a non-2xx status,
    /// malformed JSON, or a missing `data.accessToken`.
    pub async fn get_access_token(&self) -> Result<AccessToken> {
        let timestamp = self.clock.timestamp_ms_string();
        let encryption =
            token_encryption(&self.config.access_key, &timestamp, &self.config.access_secret);
        let body = serde_json::to_string(&TokenRequest {
            app_key: &self.config.access_key,
            encryption: &encryption,
            timestamp: &timestamp,
        })
        .map_err(|e| AgentError::internal(format!("token request: {e}")))?;

        let request = HttpRequest::post(self.url(PATH_TOKEN))
            .header(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(body);

        let data: TokenData = self.exchange(request).await?;
        let token = data
            .access_token
            .ok_or_else(|| AgentError::api("response missing data.accessToken"))?;

        debug!("Access token obtained");
        Ok(AccessToken::new(token))
    }

    /// Sends a signed request and returns its `data` object.
    ///
    /// `timestamp` goes into both the signature and `apim-timestamp`; a
    /// body that embeds a timestamp must carry the same value.
    async fn signed_exchange<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        params: RequestParams,
        timestamp: String,
    ) -> Result<T> {
        let token = self.get_access_token().await?;
        let signature = request_signature(
            token.expose(),
            &params.canonical(),
            &timestamp,
            &self.config.access_secret,
        );

        let mut request = match method {
            HttpMethod::Get => HttpRequest::get(self.url(path)),
            HttpMethod::Post => HttpRequest::post(self.url(path)),
        }
        .query(params.query_pairs());
        if let Some(body) = params.body_str() {
            request = request
                .header(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON)
                .body(body);
        }
        let request = request
            .header(HEADER_ACCESS_TOKEN, token.expose())
            .header(HEADER_SIGNATURE, signature)
            .header(HEADER_TIMESTAMP, timestamp);

        self.exchange(request).await
    }

    async fn exchange<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let url = request.url.clone();
        if let Some(watchdog) = &self.watchdog {
            watchdog.feed();
        }
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(AgentError::api(format!("{url}: HTTP {}", response.status)));
        }
        let parsed: ApiResponse<T> = serde_json::from_str(&response.body)
            .map_err(|e| AgentError::api(format!("{url}: unexpected JSON shape: {e}")))?;
        parsed
            .data
            .ok_or_else(|| AgentError::api(format!("{url}: response missing data")))
    }

    async fn try_get_device_secret(&self) -> Result<DeviceSecret> {
        let params = RequestParams::new("get")
            .param("orgId", &self.config.ou_id)
            .param("productKey", &self.config.product_key)
            .param("deviceKey", self.uuid.as_str());
        let timestamp = self.clock.timestamp_ms_string();
        let data: DeviceData = self
            .signed_exchange(HttpMethod::Get, PATH_DEVICES, params, timestamp)
            .await?;
        data.device_secret
            .map(DeviceSecret::new)
            .ok_or_else(|| AgentError::api("response missing data.deviceSecret"))
    }

    async fn try_create_device(&self, name: &str) -> Result<DeviceSecret> {
        let body = serde_json::to_string(&CreateDeviceRequest {
            product_key: &self.config.product_key,
            timezone: DEVICE_TIMEZONE,
            device_name: DeviceName {
                default_value: name,
                i18n_value: "",
            },
            device_key: self.uuid.as_str(),
        })
        .map_err(|e| AgentError::internal(format!("create request: {e}")))?;

        let params = RequestParams::new("create")
            .param("orgId", &self.config.ou_id)
            .body(body);
        let timestamp = self.clock.timestamp_ms_string();
        let data: DeviceData = self
            .signed_exchange(HttpMethod::Post, PATH_DEVICES, params, timestamp)
            .await?;
        data.device_secret
            .map(DeviceSecret::new)
            .ok_or_else(|| AgentError::api("response missing data.deviceSecret"))
    }

    async fn try_sign_csr(&self, csr_pem: &str, valid_days: u32) -> Result<SignedCertificate> {
        let timestamp = self.clock.timestamp_ms_string();
        let body = serde_json::to_string(&CertificateRequest {
            csr: csr_pem,
            valid_day: valid_days,
            timestamp: &timestamp,
        })
        .map_err(|e| AgentError::internal(format!("certificate request: {e}")))?;

        let params = RequestParams::new("apply")
            .param("orgId", &self.config.ou_id)
            .param("productKey", &self.config.product_key)
            .param("deviceKey", self.uuid.as_str())
            .body(body);
        let data: CertificateData = self
            .signed_exchange(HttpMethod::Post, PATH_CERTIFICATES, params, timestamp)
            .await?;

        match (data.cert, data.cert_sn) {
            (Some(certificate), Some(serial_number)) => Ok(SignedCertificate {
                certificate,
                serial_number,
            }),
            _ => Err(AgentError::api("response missing data.cert or data.certSN")),
        }
    }
}

#[async_trait]
impl DeviceRegistry for CloudClient {
    async fn get_device_secret(&self) -> Option<DeviceSecret> {
        match self.try_get_device_secret().await {
            Ok(secret) => {
                info!(uuid = %self.uuid, "Device already registered");
                Some(secret)
            }
            Err(e) => {
                warn!(uuid = %self.uuid, error = %e, "Device secret unavailable");
                None
            }
        }
    }

    async fn create_device(&self, name: &str) -> Option<DeviceSecret> {
        match self.try_create_device(name).await {
            Ok(secret) => {
                info!(uuid = %self.uuid, name, "Device created");
                Some(secret)
            }
            Err(e) => {
                warn!(uuid = %self.uuid, error = %e, "Device creation failed");
                None
            }
        }
    }
}

#[async_trait]
impl CertificateAuthority for CloudClient {
    async fn sign_csr(&self, csr_pem: &str, valid_days: u32) -> Option<SignedCertificate> {
        match self.try_sign_csr(csr_pem, valid_days).await {
            Ok(signed) => {
                info!(serial = %signed.serial_number, "Certificate issued");
                Some(signed)
            }
            Err(e) => {
                warn!(error = %e, "Certificate signing failed");
                None
            }
        }
    }
}

impl fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudClient")
            .field("api_url", &self.config.api_url)
            .field("uuid", &self.uuid)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use decada_common::ManualClock;
    use decada_core::crypto::sign;
    use crate::services::watchdog::CountingWatchdog;
    use decada_transport::mock::{MockHttpTransport, MockReply};

    const UUID_WORDS: [u32; 3] = [0x0a1b_2c3d, 0x4e5f_6071, 0x8293_a4b5];
    const TOKEN_OK: &str = r#"{"data":{"accessToken":"tok-1"}}"#;

    fn cloud_config() -> CloudConfig {
        CloudConfig {
            api_url: "https://api.test".into(),
            ou_id: "ou-1".into(),
            access_key: "ak-1".into(),
            access_secret: "secret-1".into(),
            product_key: "pk-1".into(),
            ..CloudConfig::default()
        }
    }

    fn client(http: Arc<MockHttpTransport>) -> CloudClient {
        CloudClient::new(
            cloud_config(),
            DeviceUuid::from_words(UUID_WORDS),
            http,
            Arc::new(ManualClock::from_secs(1_700_000_000)),
        )
    }

    #[tokio::test]
    async fn test_access_token_request() {
        let http = Arc::new(
            MockHttpTransport::new().route(HttpMethod::Post, PATH_TOKEN, vec![MockReply::ok(TOKEN_OK)]),
        );
        let token = client(http.clone()).get_access_token().await.unwrap();
        assert_eq!(token.expose(), "tok-1");

        let request = &http.requests()[0];
        assert_eq!(request.url, "https://api.test/apim-token-service/v2.0/token/get");
        assert_eq!(request.header_value("content-type"), Some(CONTENT_TYPE_JSON));
        let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["appKey"], "ak-1");
        assert_eq!(body["timestamp"], "1700000000000");
        assert_eq!(
            body["encryption"],
            sign("secret-1", &["ak-1", "1700000000000"]).as_str()
        );
    }

    #[tokio::test]
    async fn test_access_token_failures() {
        for reply in [
            MockReply::status(500, TOKEN_OK),
            MockReply::ok("not json"),
            MockReply::ok(r#"{"data":{}}"#),
            MockReply::Fail("connection reset".into()),
        ] {
            let http = Arc::new(MockHttpTransport::new().route(HttpMethod::Post, PATH_TOKEN, vec![reply]));
            assert!(client(http.clone()).get_access_token().await.is_err());
            assert_eq!(http.requests().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_get_device_secret_signed() {
        let http = Arc::new(
            MockHttpTransport::new()
                .route(HttpMethod::Post, PATH_TOKEN, vec![MockReply::ok(TOKEN_OK)])
                .route(
                    HttpMethod::Get,
                    PATH_DEVICES,
                    vec![MockReply::ok(r#"{"data":{"deviceSecret":"ds-1"}}"#)],
                ),
        );
        let secret = client(http.clone()).get_device_secret().await.unwrap();
        assert_eq!(secret.expose(), "ds-1");

        let request = http
            .requests()
            .into_iter()
            .find(|r| r.method == HttpMethod::Get)
            .unwrap();
        assert_eq!(request.query_value("action"), Some("get"));
        assert_eq!(request.query_value("deviceKey"), Some("0a1b2c3d4e5f60718293a4b5"));
        assert_eq!(request.header_value("apim-accesstoken"), Some("tok-1"));
        assert_eq!(request.header_value("apim-timestamp"), Some("1700000000000"));
        assert!(request.header_value("content-type").is_none());

        let expected = sign(
            "secret-1",
            &[
                "tok-1",
                "actiongetdeviceKey0a1b2c3d4e5f60718293a4b5orgIdou-1productKeypk-1",
                "1700000000000",
            ],
        );
        assert_eq!(request.header_value("apim-signature"), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_get_device_secret_absent_is_none() {
        let http = Arc::new(
            MockHttpTransport::new()
                .route(HttpMethod::Post, PATH_TOKEN, vec![MockReply::ok(TOKEN_OK)])
                .route(HttpMethod::Get, PATH_DEVICES, vec![MockReply::ok(r#"{"data":null}"#)]),
        );
        assert!(client(http).get_device_secret().await.is_none());
    }

    #[tokio::test]
    async fn test_token_failure_makes_secret_absent() {
        let http = Arc::new(MockHttpTransport::new());
        assert!(client(http.clone()).get_device_secret().await.is_none());
        assert_eq!(http.count(HttpMethod::Get, PATH_DEVICES), 0);
    }

    #[tokio::test]
    async fn test_create_device_signs_body() {
        let http = Arc::new(
            MockHttpTransport::new()
                .route(HttpMethod::Post, PATH_TOKEN, vec![MockReply::ok(TOKEN_OK)])
                .route(
                    HttpMethod::Post,
                    PATH_DEVICES,
                    vec![MockReply::ok(r#"{"data":{"deviceSecret":"ds-2"}}"#)],
                ),
        );
        let secret = client(http.clone())
            .create_device("core-0a1b2c3d4e5f60718293a4b5")
            .await
            .unwrap();
        assert_eq!(secret.expose(), "ds-2");

        let request = http
            .requests()
            .into_iter()
            .find(|r| r.url.contains(PATH_DEVICES))
            .unwrap();
        let body = request.body.clone().unwrap();
        assert!(body.contains(r#""deviceKey":"0a1b2c3d4e5f60718293a4b5""#));
        assert!(body.contains(r#""defaultValue":"core-0a1b2c3d4e5f60718293a4b5""#));
        assert_eq!(request.query_value("action"), Some("create"));
        assert!(request.query_value("productKey").is_none());

        let canonical = format!("actioncreateorgIdou-1{body}");
        let expected = sign("secret-1", &["tok-1", &canonical, "1700000000000"]);
        assert_eq!(request.header_value("apim-signature"), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_sign_csr_requires_both_fields() {
        let http = Arc::new(
            MockHttpTransport::new()
                .route(HttpMethod::Post, PATH_TOKEN, vec![MockReply::ok(TOKEN_OK)])
                .route(
                    HttpMethod::Post,
                    PATH_CERTIFICATES,
                    vec![
                        MockReply::ok(r#"{"data":{"cert":"PEM"}}"#),
                        MockReply::ok(r#"{"data":{"cert":"PEM","certSN":null}}"#),
                        MockReply::ok(r#"{"data":{"cert":"PEM","certSN":"7f"}}"#),
                    ],
                ),
        );
        let client = client(http.clone());
        assert!(client.sign_csr("CSR", 365).await.is_none());
        assert!(client.sign_csr("CSR", 365).await.is_none());
        let signed = client.sign_csr("CSR", 365).await.unwrap();
        assert_eq!(signed.certificate, "PEM");
        assert_eq!(signed.serial_number, "7f");

        let request = http
            .requests()
            .into_iter()
            .find(|r| r.url.contains(PATH_CERTIFICATES))
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["validDay"], 365);
        assert_eq!(body["csr"], "CSR");
        assert_eq!(request.query_value("action"), Some("apply"));
    }

    /// Clock that moves forward one millisecond on every read.
    struct SteppingClock(std::sync::atomic::AtomicU64);

    impl Clock for SteppingClock {
        fn now_ms(&self) -> u64 {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
        }

        fn now_unix_seconds(&self) -> i64 {
            i64::try_from(self.now_ms() / 1000).unwrap()
        }
    }

    #[tokio::test]
    async fn test_sign_csr_body_and_header_share_timestamp() {
        let http = Arc::new(
            MockHttpTransport::new()
                .route(HttpMethod::Post, PATH_TOKEN, vec![MockReply::ok(TOKEN_OK)])
                .route(
                    HttpMethod::Post,
                    PATH_CERTIFICATES,
                    vec![MockReply::ok(r#"{"data":{"cert":"PEM","certSN":"7f"}}"#)],
                ),
        );
        let client = CloudClient::new(
            cloud_config(),
            DeviceUuid::from_words(UUID_WORDS),
            http.clone(),
            Arc::new(SteppingClock(std::sync::atomic::AtomicU64::new(1_700_000_000_000))),
        );
        client.sign_csr("CSR", 365).await.unwrap();

        let request = http
            .requests()
            .into_iter()
            .find(|r| r.url.contains(PATH_CERTIFICATES))
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        let header = request.header_value("apim-timestamp").unwrap();
        assert_eq!(body["timestamp"], header);

        let canonical = format!(
            "actionapplydeviceKey0a1b2c3d4e5f60718293a4b5orgIdou-1productKeypk-1{}",
            request.body.as_deref().unwrap()
        );
        let expected = sign("secret-1", &["tok-1", &canonical, header]);
        assert_eq!(request.header_value("apim-signature"), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_every_round_trip_feeds_watchdog() {
        let http = Arc::new(
            MockHttpTransport::new()
                .route(HttpMethod::Post, PATH_TOKEN, vec![MockReply::ok(TOKEN_OK)])
                .route(HttpMethod::Get, PATH_DEVICES, vec![MockReply::status(404, "")])
                .route(
                    HttpMethod::Post,
                    PATH_DEVICES,
                    vec![MockReply::ok(r#"{"data":{"deviceSecret":"ds-2"}}"#)],
                ),
        );
        let watchdog = Arc::new(CountingWatchdog::default());
        let handle = watchdog.handle("communications");
        let client = client(http.clone()).with_watchdog(handle.clone());

        assert!(client.get_device_secret().await.is_none());
        assert_eq!(watchdog.feeds(handle.channel()), 2);

        client.create_device("core-0a1b2c3d4e5f60718293a4b5").await.unwrap();
        assert_eq!(watchdog.feeds(handle.channel()), 4);
        assert_eq!(http.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_token_fetched_per_call() {
        let http = Arc::new(
            MockHttpTransport::new()
                .route(HttpMethod::Post, PATH_TOKEN, vec![MockReply::ok(TOKEN_OK)])
                .route(HttpMethod::Get, PATH_DEVICES, vec![MockReply::status(404, "")]),
        );
        let client = client(http.clone());
        client.get_device_secret().await;
        client.get_device_secret().await;
        assert_eq!(http.count(HttpMethod::Post, PATH_TOKEN), 2);
    }
}
