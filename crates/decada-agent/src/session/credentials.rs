// ============================================
// File: crates/decada-agent/src/session/credentials.rs
// ============================================
//! Broker login material derived from the device identity.
//!
//! ```text
//! client_id = <uuid>|securemode=2,signmethod=sha256,timestamp=<ts>|
//! username  = <uuid>&<product_key>
//! password  = session_password(uuid, product_key, ts, device_secret)
//! ```
//!
//! The timestamp is taken per derivation, so every connection attempt
//! presents a different password.

use std::fmt;

use zeroize::Zeroizing;

use decada_common::{DeviceSecret, DeviceUuid};
use decada_core::crypto::session_password;
use decada_core::protocol::Connect;

use crate::config::BrokerConfig;

/// Credentials for one connection attempt.
#[derive(Clone)]
pub struct SessionCredentials {
    /// MQTT client identifier.
    pub client_id: String,
    /// MQTT username.
    pub username: String,
    password: Zeroizing<String>,
    /// Broker hostname.
    pub broker_host: String,
    /// Broker port.
    pub broker_port: u16,
}

impl SessionCredentials {
    /// Derives credentials for `uuid` at `timestamp_ms`.
    #[must_use]
    pub fn derive(
        uuid: &DeviceUuid,
        product_key: &str,
        device_secret: &DeviceSecret,
        broker: &BrokerConfig,
        timestamp_ms: &str,
    ) -> Self {
        let device_key = uuid.as_str();
        Self {
            client_id: format!(
                "{device_key}|securemode=2,signmethod=sha256,timestamp={timestamp_ms}|"
            ),
            username: format!("{device_key}&{product_key}"),
            password: Zeroizing::new(session_password(
                device_key,
                product_key,
                timestamp_ms,
                device_secret.expose(),
            )),
            broker_host: broker.host.clone(),
            broker_port: broker.port,
        }
    }

    /// MQTT password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// CONNECT packet presenting these credentials with a clean session.
    #[must_use]
    pub fn connect_packet(&self, keep_alive_secs: u16) -> Connect {
        Connect {
            client_id: self.client_id.clone(),
            username: Some(self.username.clone()),
            password: Some(self.password.to_string()),
            keep_alive_secs,
            clean_session: true,
        }
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("broker_host", &self.broker_host)
            .field("broker_port", &self.broker_port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decada_core::crypto::sign;

    fn derive(ts: &str) -> SessionCredentials {
        SessionCredentials::derive(
            &DeviceUuid::from_words([0x0a1b_2c3d, 0x4e5f_6071, 0x8293_a4b5]),
            "pk-1",
            &DeviceSecret::new("ds-1"),
            &BrokerConfig::default(),
            ts,
        )
    }

    #[test]
    fn test_derivation() {
        let creds = derive("1700000000000");
        assert_eq!(
            creds.client_id,
            "0a1b2c3d4e5f60718293a4b5|securemode=2,signmethod=sha256,timestamp=1700000000000|"
        );
        assert_eq!(creds.username, "0a1b2c3d4e5f60718293a4b5&pk-1");
        assert_eq!(
            creds.password(),
            sign(
                "ds-1",
                &[
                    "clientId",
                    "0a1b2c3d4e5f60718293a4b5",
                    "deviceKey",
                    "0a1b2c3d4e5f60718293a4b5",
                    "productKey",
                    "pk-1",
                    "timestamp",
                    "1700000000000",
                ]
            )
        );
        assert_eq!(creds.broker_port, 18885);
    }

    #[test]
    fn test_password_changes_per_timestamp() {
        assert_ne!(derive("1700000000000").password(), derive("1700000001000").password());
    }

    #[test]
    fn test_connect_packet_and_debug() {
        let creds = derive("1700000000000");
        let connect = creds.connect_packet(60);
        assert!(connect.clean_session);
        assert_eq!(connect.keep_alive_secs, 60);
        assert_eq!(connect.password.as_deref(), Some(creds.password()));
        assert!(!format!("{creds:?}").contains(creds.password()));
    }
}
