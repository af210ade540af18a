// ============================================
// File: crates/decada-agent/src/services/telemetry.rs
// ============================================
//! # Telemetry Producer
//!
//! ## Creation Reason
//! Produces one measure-point reading per period and hands it to the
//! consumer through the mailbox. The reading is the current Unix time in
//! seconds, standing in for a sensor.
//!
//! ## Main Functionality
//! - Waits for the session to reach CONNECTED
//! - Every period: build `thing.measurepoint.post` JSON, enqueue, feed
//!
//! ## Payload
//! ```text
//! {"id":"<uuid>","version":"1.0",
//!  "params":{"measurepoints":{"chronos_s":"1700000000"}},
//!  "method":"thing.measurepoint.post"}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The producer keeps feeding its channel while it waits for the
//!   first connection; waiting is not a hang
//! - The producer never publishes itself; only the consumer owns the
//!   fatal publish path
//!
//! ## Last Modified
//! v0.1.0 - Initial telemetry producer

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use decada_common::{Clock, DeviceUuid};
use decada_core::protocol::MeasurepointPost;

use super::mailbox::MailboxSender;
use super::watchdog::WatchdogHandle;
use crate::config::TelemetryConfig;
use crate::error::{AgentError, Result};
use crate::session::SessionState;

/// Periodic measure-point producer.
pub struct TelemetryProducer {
    uuid: DeviceUuid,
    measurepoint: String,
    period: Duration,
    clock: Arc<dyn Clock>,
    mailbox: MailboxSender,
    watchdog: WatchdogHandle,
}

impl TelemetryProducer {
    /// Creates a producer writing into `mailbox`.
    pub fn new(
        config: &TelemetryConfig,
        uuid: DeviceUuid,
        clock: Arc<dyn Clock>,
        mailbox: MailboxSender,
        watchdog: WatchdogHandle,
    ) -> Self {
        Self {
            uuid,
            measurepoint: config.measurepoint.clone(),
            period: config.period(),
            clock,
            mailbox,
            watchdog,
        }
    }

    /// Builds one reading.
    ///
    /// # Errors
    /// Returns an encoding error if serialization fails.
    pub fn reading(&self) -> Result<String> {
        let value = self.clock.now_unix_seconds().to_string();
        Ok(MeasurepointPost::single(self.uuid.as_str(), self.measurepoint.as_str(), value).to_json()?)
    }

    /// Runs until `cancel` fires.
    ///
    /// # Errors
    /// - `MailboxClosed` once the consumer is gone
    /// - `NotConnected` if the session is dropped before it ever connects
    pub async fn run(self, mut state: watch::Receiver<SessionState>, cancel: CancellationToken) -> Result<()> {
        if !self.wait_connected(&mut state, &cancel).await? {
            return Ok(());
        }
        info!(period_secs = self.period.as_secs(), point = %self.measurepoint, "Telemetry producer started");

        loop {
            let reading = self.reading()?;
            let len = self.mailbox.send(reading).await?;
            debug!(len, "Reading produced");
            self.watchdog.feed();

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.period) => {}
            }
        }
        info!("Telemetry producer stopped");
        Ok(())
    }

    /// Returns `false` when cancelled first.
    async fn wait_connected(
        &self,
        state: &mut watch::Receiver<SessionState>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let mut ticker = tokio::time::interval(self.period);
        loop {
            if *state.borrow_and_update() == SessionState::Connected {
                return Ok(true);
            }
            tokio::select! {
                () = cancel.cancelled() => return Ok(false),
                changed = state.changed() => {
                    if changed.is_err() {
                        return Err(AgentError::NotConnected);
                    }
                }
                _ = ticker.tick() => self.watchdog.feed(),
            }
        }
    }
}

impl std::fmt::Debug for TelemetryProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryProducer")
            .field("uuid", &self.uuid)
            .field("measurepoint", &self.measurepoint)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mailbox::mailbox;
    use crate::services::watchdog::CountingWatchdog;
    use decada_common::time::ManualClock;

    fn producer(
        period_secs: u64,
        tx: MailboxSender,
        watchdog: &Arc<CountingWatchdog>,
    ) -> (TelemetryProducer, WatchdogHandle) {
        let handle = watchdog.handle("telemetry");
        let config = TelemetryConfig {
            period_secs,
            ..TelemetryConfig::default()
        };
        let producer = TelemetryProducer::new(
            &config,
            DeviceUuid::from_words([1, 2, 3]),
            Arc::new(ManualClock::from_secs(1_700_000_000)),
            tx,
            handle.clone(),
        );
        (producer, handle)
    }

    #[test]
    fn test_reading_format() {
        let (tx, _rx) = mailbox(1);
        let watchdog = Arc::new(CountingWatchdog::default());
        let (producer, _) = producer(10, tx, &watchdog);

        let json: serde_json::Value = serde_json::from_str(&producer.reading().unwrap()).unwrap();
        assert_eq!(json["id"], "000000010000000200000003");
        assert_eq!(json["method"], "thing.measurepoint.post");
        assert_eq!(json["params"]["measurepoints"]["chronos_s"], "1700000000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_connection_then_produces() {
        let (tx, mut rx) = mailbox(1);
        let watchdog = Arc::new(CountingWatchdog::default());
        let (producer, handle) = producer(10, tx, &watchdog);
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(producer.run(state_rx, cancel.clone()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(watchdog.feeds(handle.channel()) >= 2);

        state_tx.send_replace(SessionState::Connected);
        let first = rx.recv().await.unwrap();
        assert!(std::str::from_utf8(&first).unwrap().contains("\"chronos_s\":\"1700000000\""));
        let second = rx.recv().await.unwrap();
        assert_eq!(first, second);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_consumer_gone() {
        let (tx, rx) = mailbox(1);
        drop(rx);
        let watchdog = Arc::new(CountingWatchdog::default());
        let (producer, _) = producer(10, tx, &watchdog);
        let (_state_tx, state_rx) = watch::channel(SessionState::Connected);

        let err = producer.run(state_rx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::MailboxClosed));
    }
}
