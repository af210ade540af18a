// ============================================
// File: crates/decada-agent/src/provisioning/registration.rs
// ============================================
//! # Device Registration
//!
//! Create-or-fetch of the cloud device entity.
//!
//! ```text
//! UNREGISTERED ── get_device_secret() = Some ─────────────────► REGISTERED
//!      │
//!      └─ None ─► loop { feed(); create_device(); feed(); sleep(backoff) } ─► REGISTERED
//! ```
//!
//! The loop is unbounded unless `registration.max_attempts` is set; the
//! watchdog is fed on every iteration, so a slow but responsive network
//! never trips it while a hung transport call does.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use decada_common::{DeviceSecret, DeviceUuid};

use super::models::DEVICE_NAME_PREFIX;
use crate::config::RegistrationConfig;
use crate::error::{AgentError, Result};
use crate::services::watchdog::WatchdogHandle;

/// Cloud operations behind registration.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Looks up the secret of an existing device. `None` means "not yet
    /// registered" and covers every failure.
    async fn get_device_secret(&self) -> Option<DeviceSecret>;

    /// Creates the device named `name`. `None` on any failure.
    async fn create_device(&self, name: &str) -> Option<DeviceSecret>;
}

/// Registration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// No secret obtained yet.
    Unregistered,
    /// Secret obtained; terminal for the session.
    Registered,
}

/// Registration workflow for one device.
pub struct DeviceRegistration {
    registry: Arc<dyn DeviceRegistry>,
    policy: RegistrationConfig,
    device_name: String,
    secret: Option<DeviceSecret>,
}

impl DeviceRegistration {
    /// Creates the workflow; the cloud device is named `core-<uuid>`.
    pub fn new(registry: Arc<dyn DeviceRegistry>, uuid: &DeviceUuid, policy: RegistrationConfig) -> Self {
        Self {
            registry,
            policy,
            device_name: format!("{DEVICE_NAME_PREFIX}{uuid}"),
            secret: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> RegistrationState {
        if self.secret.is_some() {
            RegistrationState::Registered
        } else {
            RegistrationState::Unregistered
        }
    }

    /// Name the device is created under.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Returns the device secret, registering the device if needed.
    ///
    /// # Errors
    /// Returns `RegistrationExhausted` only when an attempt cap is
    /// configured and reached.
    pub async fn ensure_registered(&mut self, watchdog: &WatchdogHandle) -> Result<DeviceSecret> {
        if let Some(secret) = &self.secret {
            return Ok(secret.clone());
        }

        watchdog.feed();
        let mut found = self.registry.get_device_secret().await;
        let mut attempts = 0u32;

        while found.is_none() {
            if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(AgentError::RegistrationExhausted { attempts });
            }
            attempts += 1;

            watchdog.feed();
            found = self.registry.create_device(&self.device_name).await;
            watchdog.feed();
            if found.is_none() {
                warn!(attempt = attempts, "Device creation did not return a secret, retrying");
                tokio::time::sleep(self.policy.backoff()).await;
            }
        }

        info!(name = %self.device_name, attempts, "Device registered");
        let secret = found.ok_or_else(|| AgentError::internal("registration loop ended without secret"))?;
        self.secret = Some(secret.clone());
        Ok(secret)
    }
}

impl std::fmt::Debug for DeviceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistration")
            .field("device_name", &self.device_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::watchdog::CountingWatchdog;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Registry replaying scripted answers and counting calls.
    #[derive(Default)]
    struct ScriptedRegistry {
        lookup: Option<&'static str>,
        creates: Mutex<VecDeque<Option<&'static str>>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeviceRegistry for ScriptedRegistry {
        async fn get_device_secret(&self) -> Option<DeviceSecret> {
            self.calls.lock().push("get".into());
            self.lookup.map(DeviceSecret::new)
        }

        async fn create_device(&self, name: &str) -> Option<DeviceSecret> {
            self.calls.lock().push(format!("create {name}"));
            self.creates.lock().pop_front().flatten().map(DeviceSecret::new)
        }
    }

    fn uuid() -> DeviceUuid {
        DeviceUuid::from_words([1, 2, 3])
    }

    fn fast_policy(max_attempts: Option<u32>) -> RegistrationConfig {
        RegistrationConfig {
            backoff_ms: 1,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_existing_device_skips_creation() {
        let registry = Arc::new(ScriptedRegistry {
            lookup: Some("ds"),
            ..ScriptedRegistry::default()
        });
        let watchdog = Arc::new(CountingWatchdog::default());
        let mut registration = DeviceRegistration::new(registry.clone(), &uuid(), fast_policy(None));

        let secret = registration.ensure_registered(&watchdog.handle("reg")).await.unwrap();
        assert_eq!(secret.expose(), "ds");
        assert_eq!(registry.calls.lock().len(), 1);
        assert_eq!(registration.state(), RegistrationState::Registered);
    }

    #[tokio::test]
    async fn test_retries_until_created() {
        let registry = Arc::new(ScriptedRegistry {
            lookup: None,
            creates: Mutex::new(VecDeque::from([None, Some("ds-3")])),
            ..ScriptedRegistry::default()
        });
        let watchdog = Arc::new(CountingWatchdog::default());
        let handle = watchdog.handle("reg");
        let mut registration = DeviceRegistration::new(registry.clone(), &uuid(), fast_policy(None));

        let secret = registration.ensure_registered(&handle).await.unwrap();

        assert_eq!(secret.expose(), "ds-3");
        let calls = registry.calls.lock().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], "get");
        assert_eq!(calls[1], "create core-000000010000000200000003");
        // once before the lookup, twice around each create
        assert_eq!(watchdog.feeds(handle.channel()), 5);
    }

    #[tokio::test]
    async fn test_registered_state_is_terminal() {
        let registry = Arc::new(ScriptedRegistry {
            lookup: Some("ds"),
            ..ScriptedRegistry::default()
        });
        let watchdog = Arc::new(CountingWatchdog::default());
        let handle = watchdog.handle("reg");
        let mut registration = DeviceRegistration::new(registry.clone(), &uuid(), fast_policy(None));

        registration.ensure_registered(&handle).await.unwrap();
        registration.ensure_registered(&handle).await.unwrap();
        assert_eq!(registry.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_attempt_cap() {
        let registry = Arc::new(ScriptedRegistry::default());
        let watchdog = Arc::new(CountingWatchdog::default());
        let mut registration = DeviceRegistration::new(registry.clone(), &uuid(), fast_policy(Some(2)));

        let err = registration
            .ensure_registered(&watchdog.handle("reg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::RegistrationExhausted { attempts: 2 }));
        assert_eq!(registration.state(), RegistrationState::Unregistered);
        assert_eq!(registry.calls.lock().len(), 3);
    }
}
