// ============================================
// File: crates/decada-agent/src/config.rs
// ============================================
//! # Agent Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the provisioning agent,
//! loaded from a TOML file with every field defaulted.
//!
//! ## Main Functionality
//! - `AgentConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Device UUID resolution (configured UID words or machine id)
//!
//! ## Configuration Sections
//! - `device`: Where the 96-bit UID comes from
//! - `cloud`: REST API base URL and tenant credentials
//! - `broker`: Session broker host and port
//! - `credentials`: Broker CA certificate
//! - `identity`: Key algorithm, CSR subject, certificate validity
//! - `registration`: Backoff and optional attempt cap
//! - `session`: Connect retries, timeouts, pump period
//! - `telemetry`: Producer period and mailbox capacity
//! - `watchdog`: Software watchdog window
//! - `store`: Persistent store file
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [cloud]
//! api_url = "https://ag.decada.gov.sg"
//! ou_id = "ou-1"
//! access_key = "ak-1"
//! access_secret = "s3cr3t"
//! product_key = "pk-1"
//!
//! [broker]
//! host = "mqtt.decada.gov.sg"
//! port = 18885
//!
//! [credentials]
//! ca_cert_path = "/etc/decada/ca.pem"
//!
//! [registration]
//! backoff_ms = 500
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require agent restart
//! - `access_secret` is redacted from `Debug`
//! - An absent `registration.max_attempts` means retry forever
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use decada_common::DeviceUuid;
use decada_core::crypto::{BaseSubject, KeyAlgorithm};

use crate::error::{AgentError, Result};

// ============================================
// AgentConfig
// ============================================

/// Main agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Device identity source.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Cloud REST API.
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Session broker.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Trusted certificates.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Key pair and CSR settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Registration loop.
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Session manager.
    #[serde(default)]
    pub session: SessionConfig,

    /// Telemetry producer.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Inbound command handling.
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Watchdog.
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Persistent store.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AgentConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AgentError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AgentError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the TOML is invalid or fails validation.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AgentError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        self.cloud.validate()?;
        self.broker.validate()?;
        self.identity.validate()?;
        self.registration.validate()?;
        self.session.validate()?;
        self.telemetry.validate()?;
        self.commands.validate()?;
        self.watchdog.validate()?;
        self.validate_watchdog_budget()
    }

    /// The watchdog window must outlast every fed-once activity: one
    /// telemetry period, a full broker connect sequence, and two REST
    /// round-trips (the token request plus the signed call).
    fn validate_watchdog_budget(&self) -> Result<()> {
        if !self.watchdog.enabled {
            return Ok(());
        }
        let window = self.watchdog.window();
        if window <= self.telemetry.period() {
            return Err(AgentError::config_invalid(
                "watchdog.window_ms",
                "must exceed telemetry.period_secs",
            ));
        }
        let connect_budget = self.session.connect_timeout() * self.session.connect_retries;
        if window <= connect_budget {
            return Err(AgentError::config_invalid(
                "watchdog.window_ms",
                "must exceed session.connect_retries * session.connect_timeout_secs",
            ));
        }
        if window <= self.cloud.request_timeout() * 2 {
            return Err(AgentError::config_invalid(
                "watchdog.window_ms",
                "must exceed twice cloud.request_timeout_secs",
            ));
        }
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

fn require_positive(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(AgentError::config_invalid(field, "must be greater than 0"));
    }
    Ok(())
}

// ============================================
// DeviceConfig
// ============================================

/// Device identity source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Factory UID words; when absent the UID is derived from the
    /// machine id file.
    #[serde(default)]
    pub uid_words: Option<[u32; 3]>,

    /// Hex machine id file consulted when `uid_words` is absent.
    #[serde(default = "default_machine_id_path")]
    pub machine_id_path: String,
}

fn default_machine_id_path() -> String {
    "/etc/machine-id".to_string()
}

impl DeviceConfig {
    fn validate(&self) -> Result<()> {
        if self.uid_words.is_none() && self.machine_id_path.is_empty() {
            return Err(AgentError::config_invalid(
                "device.machine_id_path",
                "required when uid_words is not set",
            ));
        }
        Ok(())
    }

    /// Resolves the device UUID.
    ///
    /// # Errors
    /// Returns error if the machine id file is unreadable, not hex, or
    /// shorter than 12 bytes.
    pub async fn resolve_uuid(&self) -> Result<DeviceUuid> {
        if let Some(words) = self.uid_words {
            return Ok(DeviceUuid::from_words(words));
        }

        let content = tokio::fs::read_to_string(&self.machine_id_path)
            .await
            .map_err(|e| AgentError::config_load(&self.machine_id_path, e.to_string()))?;
        DeviceUuid::from_machine_id(&content)
            .map_err(|e| AgentError::config_invalid("device.machine_id_path", e.to_string()))
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            uid_words: None,
            machine_id_path: default_machine_id_path(),
        }
    }
}

// ============================================
// CloudConfig
// ============================================

/// Cloud REST API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Organisation (OU) identifier.
    #[serde(default)]
    pub ou_id: String,

    /// Application access key.
    #[serde(default)]
    pub access_key: String,

    /// Application access secret.
    #[serde(default)]
    pub access_secret: String,

    /// Product key the device belongs to.
    #[serde(default)]
    pub product_key: String,

    /// Whole-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra CA bundle trusted for the API endpoint.
    #[serde(default)]
    pub api_ca_cert_path: Option<String>,
}

fn default_api_url() -> String {
    "https://ag.decada.gov.sg".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

impl CloudConfig {
    fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("https://") && !self.api_url.starts_with("http://") {
            return Err(AgentError::config_invalid(
                "cloud.api_url",
                "must be an http(s) URL",
            ));
        }
        require_positive("cloud.request_timeout_secs", self.request_timeout_secs)
    }

    /// Checks that the tenant credentials needed for provisioning are set.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first empty field.
    pub fn ensure_credentials(&self) -> Result<()> {
        for (field, value) in [
            ("cloud.ou_id", &self.ou_id),
            ("cloud.access_key", &self.access_key),
            ("cloud.access_secret", &self.access_secret),
            ("cloud.product_key", &self.product_key),
        ] {
            if value.is_empty() {
                return Err(AgentError::config_invalid(field, "required for provisioning"));
            }
        }
        Ok(())
    }

    /// API base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ou_id: String::new(),
            access_key: String::new(),
            access_secret: String::new(),
            product_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            api_ca_cert_path: None,
        }
    }
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("api_url", &self.api_url)
            .field("ou_id", &self.ou_id)
            .field("access_key", &self.access_key)
            .field("access_secret", &"[REDACTED]")
            .field("product_key", &self.product_key)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_ca_cert_path", &self.api_ca_cert_path)
            .finish()
    }
}

// ============================================
// BrokerConfig
// ============================================

/// Session broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname (also used for SNI).
    #[serde(default = "default_broker_host")]
    pub host: String,

    /// Broker TLS port.
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

fn default_broker_host() -> String {
    "mqtt.decada.gov.sg".to_string()
}

fn default_broker_port() -> u16 {
    18885
}

impl BrokerConfig {
    fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(AgentError::config_invalid("broker.host", "cannot be empty"));
        }
        if self.port == 0 {
            return Err(AgentError::config_invalid("broker.port", "cannot be 0"));
        }
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
        }
    }
}

// ============================================
// CredentialsConfig
// ============================================

/// Trusted certificate locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Broker CA certificate (PEM).
    #[serde(default = "default_ca_cert_path")]
    pub ca_cert_path: String,
}

fn default_ca_cert_path() -> String {
    "/etc/decada/ca.pem".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            ca_cert_path: default_ca_cert_path(),
        }
    }
}

// ============================================
// IdentityConfig
// ============================================

/// Key pair and CSR configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Key algorithm (`rsa2048` or `ecdsa-p256`).
    #[serde(default)]
    pub key_algorithm: KeyAlgorithm,

    /// Requested certificate validity in days.
    #[serde(default = "default_cert_valid_days")]
    pub cert_valid_days: u32,

    /// Fixed part of the CSR subject.
    #[serde(default)]
    pub subject: BaseSubject,
}

fn default_cert_valid_days() -> u32 {
    365
}

impl IdentityConfig {
    fn validate(&self) -> Result<()> {
        require_positive("identity.cert_valid_days", u64::from(self.cert_valid_days))?;
        self.subject
            .validate()
            .map_err(|e| AgentError::config_invalid("identity.subject", e.to_string()))
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            key_algorithm: KeyAlgorithm::default(),
            cert_valid_days: default_cert_valid_days(),
            subject: BaseSubject::default(),
        }
    }
}

// ============================================
// RegistrationConfig
// ============================================

/// Registration loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Pause between `create_device` attempts, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Attempt cap; absent means unbounded.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_backoff_ms() -> u64 {
    500
}

impl RegistrationConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == Some(0) {
            return Err(AgentError::config_invalid(
                "registration.max_attempts",
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Backoff interval.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
            max_attempts: None,
        }
    }
}

// ============================================
// SessionConfig
// ============================================

/// Session manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Connection attempts before giving up.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Per-attempt deadline (DNS + handshake + CONNACK), seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Period of the inbound and keep-alive pumps, milliseconds.
    #[serde(default = "default_loop_period_ms")]
    pub loop_period_ms: u64,

    /// Keep-alive interval announced in CONNECT, seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u16,

    /// DNS lookup attempts.
    #[serde(default = "default_dns_attempts")]
    pub dns_attempts: u32,

    /// DNS per-attempt timeout, milliseconds.
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,

    /// Pause between DNS attempts, milliseconds.
    #[serde(default = "default_dns_retry_delay_ms")]
    pub dns_retry_delay_ms: u64,
}

fn default_connect_retries() -> u32 {
    3
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_loop_period_ms() -> u64 {
    1000
}

fn default_keep_alive_secs() -> u16 {
    60
}

fn default_dns_attempts() -> u32 {
    3
}

fn default_dns_timeout_ms() -> u64 {
    1000
}

fn default_dns_retry_delay_ms() -> u64 {
    250
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        require_positive("session.connect_retries", u64::from(self.connect_retries))?;
        require_positive("session.connect_timeout_secs", self.connect_timeout_secs)?;
        require_positive("session.loop_period_ms", self.loop_period_ms)?;
        require_positive("session.keep_alive_secs", u64::from(self.keep_alive_secs))?;
        require_positive("session.dns_attempts", u64::from(self.dns_attempts))?;
        require_positive("session.dns_timeout_ms", self.dns_timeout_ms)?;
        if u64::from(self.keep_alive_secs) * 1000 <= self.loop_period_ms {
            return Err(AgentError::config_invalid(
                "session.keep_alive_secs",
                "must be longer than the pump period",
            ));
        }
        if self.dns_budget() >= self.connect_timeout() {
            return Err(AgentError::config_invalid(
                "session.dns_timeout_ms",
                "all DNS attempts and retry delays must fit inside connect_timeout_secs",
            ));
        }
        Ok(())
    }

    /// Per-attempt connect deadline.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Pump period.
    #[must_use]
    pub const fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    /// DNS per-attempt timeout.
    #[must_use]
    pub const fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    /// Pause between DNS attempts.
    #[must_use]
    pub const fn dns_retry_delay(&self) -> Duration {
        Duration::from_millis(self.dns_retry_delay_ms)
    }

    /// Worst case for one resolution: every attempt times out.
    #[must_use]
    pub fn dns_budget(&self) -> Duration {
        let attempts = self.dns_attempts.max(1);
        self.dns_timeout() * attempts + self.dns_retry_delay() * (attempts - 1)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_retries: default_connect_retries(),
            connect_timeout_secs: default_connect_timeout_secs(),
            loop_period_ms: default_loop_period_ms(),
            keep_alive_secs: default_keep_alive_secs(),
            dns_attempts: default_dns_attempts(),
            dns_timeout_ms: default_dns_timeout_ms(),
            dns_retry_delay_ms: default_dns_retry_delay_ms(),
        }
    }
}

// ============================================
// TelemetryConfig
// ============================================

/// Telemetry producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Production period in seconds.
    #[serde(default = "default_telemetry_period_secs")]
    pub period_secs: u64,

    /// Measure point name carrying the reading.
    #[serde(default = "default_measurepoint")]
    pub measurepoint: String,

    /// Mailbox slots between producer and consumer.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_telemetry_period_secs() -> u64 {
    10
}

fn default_measurepoint() -> String {
    "chronos_s".to_string()
}

fn default_mailbox_capacity() -> usize {
    1
}

impl TelemetryConfig {
    fn validate(&self) -> Result<()> {
        require_positive("telemetry.period_secs", self.period_secs)?;
        if self.measurepoint.is_empty() {
            return Err(AgentError::config_invalid("telemetry.measurepoint", "cannot be empty"));
        }
        if self.mailbox_capacity == 0 {
            return Err(AgentError::config_invalid(
                "telemetry.mailbox_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Production period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            period_secs: default_telemetry_period_secs(),
            measurepoint: default_measurepoint(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

// ============================================
// CommandsConfig
// ============================================

/// Set-point keys the device accepts from the cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Keys acknowledged when they appear in a command's `params`.
    #[serde(default = "default_accepted_keys")]
    pub accepted_keys: Vec<String>,

    /// Inbound messages buffered ahead of the dispatcher.
    #[serde(default = "default_inbound_queue")]
    pub inbound_queue: usize,
}

fn default_accepted_keys() -> Vec<String> {
    vec!["chronos_s".to_string()]
}

fn default_inbound_queue() -> usize {
    16
}

impl CommandsConfig {
    fn validate(&self) -> Result<()> {
        if self.accepted_keys.iter().any(String::is_empty) {
            return Err(AgentError::config_invalid("commands.accepted_keys", "keys cannot be empty"));
        }
        if self.inbound_queue == 0 {
            return Err(AgentError::config_invalid("commands.inbound_queue", "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            accepted_keys: default_accepted_keys(),
            inbound_queue: default_inbound_queue(),
        }
    }
}

// ============================================
// WatchdogConfig
// ============================================

/// Software watchdog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Supervise channels and restart on a missed window.
    #[serde(default = "default_watchdog_enabled")]
    pub enabled: bool,

    /// Maximum gap between feeds, milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_watchdog_enabled() -> bool {
    true
}

fn default_window_ms() -> u64 {
    60_000
}

impl WatchdogConfig {
    fn validate(&self) -> Result<()> {
        require_positive("watchdog.window_ms", self.window_ms)
    }

    /// Feed window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: default_watchdog_enabled(),
            window_ms: default_window_ms(),
        }
    }
}

// ============================================
// StoreConfig
// ============================================

/// Persistent store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON store file; absent keeps values in memory only.
    #[serde(default)]
    pub path: Option<String>,
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cloud.api_url, "https://ag.decada.gov.sg");
        assert_eq!(config.broker.port, 18885);
        assert_eq!(config.registration.backoff(), Duration::from_millis(500));
        assert_eq!(config.registration.max_attempts, None);
        assert_eq!(config.session.connect_retries, 3);
        assert_eq!(config.session.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.session.loop_period(), Duration::from_secs(1));
        assert_eq!(config.telemetry.period(), Duration::from_secs(10));
        assert_eq!(config.identity.cert_valid_days, 365);
        assert_eq!(config.identity.key_algorithm, KeyAlgorithm::Rsa2048);
        assert_eq!(config.watchdog.window(), Duration::from_secs(60));
        assert_eq!(config.session.dns_budget(), Duration::from_millis(3500));
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [device]
            uid_words = [168496189, 1314873457, 2190713013]

            [cloud]
            api_url = "https://api.example.com/"
            ou_id = "ou-1"
            access_key = "ak-1"
            access_secret = "s3cr3t"
            product_key = "pk-1"

            [broker]
            host = "broker.example.com"
            port = 8883

            [identity]
            key_algorithm = "ecdsa-p256"

            [identity.subject]
            organizational_unit = "Fleet"

            [registration]
            backoff_ms = 250
            max_attempts = 10

            [telemetry]
            period_secs = 30

            [commands]
            accepted_keys = ["chronos_s", "setpoint_c"]

            [logging]
            level = "debug"
        "#;

        let config = AgentConfig::from_str(toml).unwrap();
        assert_eq!(config.cloud.base_url(), "https://api.example.com");
        assert!(config.cloud.ensure_credentials().is_ok());
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.identity.key_algorithm, KeyAlgorithm::EcdsaP256);
        assert_eq!(config.identity.subject.organizational_unit, "Fleet");
        assert_eq!(config.identity.subject.country, "SG");
        assert_eq!(config.registration.max_attempts, Some(10));
        assert_eq!(config.telemetry.period_secs, 30);
        assert_eq!(config.commands.accepted_keys, ["chronos_s", "setpoint_c"]);
        assert_eq!(config.commands.inbound_queue, 16);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_values_rejected() {
        for toml in [
            "[broker]\nport = 0",
            "[session]\nconnect_retries = 0",
            "[registration]\nmax_attempts = 0",
            "[telemetry]\nmailbox_capacity = 0",
            "[commands]\naccepted_keys = [\"\"]",
            "[watchdog]\nwindow_ms = 5000",
            "[watchdog]\nwindow_ms = 12000\n[telemetry]\nperiod_secs = 1",
            "[session]\ndns_attempts = 3\ndns_timeout_ms = 2000\ndns_retry_delay_ms = 2000",
            "[cloud]\napi_url = \"ftp://x\"",
            "[identity.subject]\ncountry = \"Singapore\"",
        ] {
            let err = AgentConfig::from_str(toml).unwrap_err();
            assert!(err.is_config_error(), "{toml}");
        }
    }

    #[test]
    fn test_watchdog_window_covers_two_requests() {
        let slow_api = "[watchdog]\nwindow_ms = 40000\n[cloud]\nrequest_timeout_secs = 20";
        let err = AgentConfig::from_str(slow_api).unwrap_err();
        assert!(err.to_string().contains("cloud.request_timeout_secs"));

        let ok = "[watchdog]\nwindow_ms = 41000\n[cloud]\nrequest_timeout_secs = 20";
        assert!(AgentConfig::from_str(ok).is_ok());

        let unsupervised = "[watchdog]\nenabled = false\nwindow_ms = 40000\n[cloud]\nrequest_timeout_secs = 20";
        assert!(AgentConfig::from_str(unsupervised).is_ok());
    }

    #[test]
    fn test_missing_credentials_detected() {
        let config = AgentConfig::default();
        let err = config.cloud.ensure_credentials().unwrap_err();
        assert!(err.to_string().contains("cloud.ou_id"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut config = AgentConfig::default();
        config.cloud.access_secret = "hunter2".into();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn test_resolve_uuid_from_words() {
        let device = DeviceConfig {
            uid_words: Some([0x0a1b_2c3d, 0x4e5f_6071, 0x8293_a4b5]),
            machine_id_path: String::new(),
        };
        assert_eq!(device.resolve_uuid().await.unwrap().as_str(), "0a1b2c3d4e5f60718293a4b5");
    }

    #[tokio::test]
    async fn test_resolve_uuid_from_machine_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-id");
        tokio::fs::write(&path, "0a1b2c3d4e5f60718293a4b5c6d7e8f9\n").await.unwrap();

        let device = DeviceConfig {
            uid_words: None,
            machine_id_path: path.display().to_string(),
        };
        assert_eq!(device.resolve_uuid().await.unwrap().as_str(), "0a1b2c3d4e5f60718293a4b5");
    }
}
