// ============================================
// File: crates/decada-agent/src/handlers/command.rs
// ============================================
//! # Command Dispatcher
//!
//! ## Creation Reason
//! Turns inbound cloud commands into device actions and acknowledges
//! each parameter the device understood.
//!
//! ## Main Functionality
//! - `CommandHandler`: per-parameter extension point
//! - `SetPointTable`: default handler storing accepted set-points
//! - `Dispatcher`: parse, dispatch, acknowledge
//!
//! ## Processing
//! ```text
//! InboundMessage { topic, payload }
//!        │
//!        ▼
//! CommandEnvelope::parse ──err──► warn, drop (no handler runs)
//!        │ ok
//!        ▼
//! for (key, value) in params:
//!     handler.handle_param(method, key, value)
//!        ├─ Some(result) ─► publish {id, code:200, data:{key: result}}
//!        │                  on <topic>_reply
//!        └─ None ─────────► log, ignore
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A malformed payload must never reach the handler
//! - A failed acknowledgment is logged; it does not end the session
//!
//! ## Last Modified
//! v0.1.0 - Initial command dispatcher

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use decada_core::protocol::{CommandAck, CommandEnvelope, TopicSet};

use crate::error::Result;
use crate::session::{InboundMessage, Publisher};

// ============================================
// CommandHandler
// ============================================

/// Device-specific handling of one command parameter.
pub trait CommandHandler: Send + Sync {
    /// Applies `key = value` from a command with `method`.
    ///
    /// Returns the value to acknowledge, or `None` when the key is not
    /// recognized.
    fn handle_param(&self, method: &str, key: &str, value: &str) -> Option<String>;
}

// ============================================
// SetPointTable
// ============================================

/// Default handler: stores values for a fixed set of keys.
#[derive(Debug, Default)]
pub struct SetPointTable {
    accepted: BTreeSet<String>,
    values: RwLock<BTreeMap<String, String>>,
}

impl SetPointTable {
    /// Creates a table accepting `keys`.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: keys.into_iter().map(Into::into).collect(),
            values: RwLock::new(BTreeMap::new()),
        }
    }

    /// Last value set for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

impl CommandHandler for SetPointTable {
    fn handle_param(&self, method: &str, key: &str, value: &str) -> Option<String> {
        if !self.accepted.contains(key) {
            return None;
        }
        info!(method, key, value, "Set-point updated");
        self.values.write().insert(key.to_string(), value.to_string());
        Some(value.to_string())
    }
}

// ============================================
// Dispatcher
// ============================================

/// Routes inbound messages to a `CommandHandler`.
pub struct Dispatcher {
    handler: Arc<dyn CommandHandler>,
    publisher: Arc<dyn Publisher>,
}

impl Dispatcher {
    /// Creates a dispatcher acknowledging through `publisher`.
    pub fn new(handler: Arc<dyn CommandHandler>, publisher: Arc<dyn Publisher>) -> Self {
        Self { handler, publisher }
    }

    /// Handles one message and returns the number of acknowledgments
    /// published.
    ///
    /// # Errors
    /// Currently infallible; malformed input and acknowledgment failures
    /// are logged.
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<usize> {
        let command = match CommandEnvelope::parse(&message.payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "Dropping malformed command");
                return Ok(0);
            }
        };

        debug!(
            id = %command.id,
            method = %command.method,
            version = %command.version,
            params = command.params.len(),
            "Command received"
        );

        let reply_topic = TopicSet::reply_topic(&message.topic);
        let mut acked = 0;
        for (key, value) in &command.params {
            let Some(result) = self.handler.handle_param(&command.method, key, value) else {
                info!(id = %command.id, key = %key, "Ignoring unrecognized parameter");
                continue;
            };

            let ack = match CommandAck::ok(command.id.as_str(), key.as_str(), result).to_json() {
                Ok(ack) => ack,
                Err(e) => {
                    warn!(id = %command.id, key = %key, error = %e, "Cannot encode acknowledgment");
                    continue;
                }
            };
            match self.publisher.publish(&reply_topic, Bytes::from(ack)).await {
                Ok(()) => acked += 1,
                Err(e) => warn!(id = %command.id, key = %key, error = %e, "Acknowledgment not delivered"),
            }
        }
        Ok(acked)
    }

    /// Dispatches messages from `inbound` until it closes or `cancel`
    /// fires.
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>, cancel: CancellationToken) {
        info!("Command dispatcher started");
        loop {
            let message = tokio::select! {
                () = cancel.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            if let Err(e) = self.dispatch(&message).await {
                warn!(error = %e, "Command dispatch failed");
            }
        }
        info!("Command dispatcher stopped");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
            if self.fail {
                return Err(AgentError::NotConnected);
            }
            self.published
                .lock()
                .push((topic.to_string(), String::from_utf8_lossy(&payload).into_owned()));
            Ok(())
        }
    }

    /// Handler counting every invocation.
    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    impl CommandHandler for CountingHandler {
        fn handle_param(&self, _method: &str, _key: &str, value: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(value.to_string())
        }
    }

    const SET_TOPIC: &str = "/sys/pk/dev/thing/service/measurepoint/set";

    fn message(payload: &str) -> InboundMessage {
        InboundMessage {
            topic: SET_TOPIC.to_string(),
            payload: Bytes::from(payload.to_string()),
        }
    }

    #[tokio::test]
    async fn test_recognized_key_acknowledged() {
        let table = Arc::new(SetPointTable::new(["chronos_s"]));
        let publisher = Arc::new(RecordingPublisher::default());
        let dispatcher = Dispatcher::new(table.clone(), publisher.clone());

        let acked = dispatcher
            .dispatch(&message(
                r#"{"id":"42","method":"thing.service.measurepoint.set","version":"1.0","params":{"chronos_s":"15","unknown":"x"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(acked, 1);
        assert_eq!(table.get("chronos_s").as_deref(), Some("15"));
        assert_eq!(table.get("unknown"), None);

        let published = publisher.published.lock().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, TopicSet::reply_topic(SET_TOPIC));
        let ack: serde_json::Value = serde_json::from_str(&published[0].1).unwrap();
        assert_eq!(ack["id"], "42");
        assert_eq!(ack["code"], 200);
        assert_eq!(ack["data"]["chronos_s"], "15");
    }

    #[tokio::test]
    async fn test_missing_params_never_reaches_handler() {
        let handler = Arc::new(CountingHandler::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let dispatcher = Dispatcher::new(handler.clone(), publisher.clone());

        for payload in [
            r#"{"id":"1","method":"m","version":"1.0"}"#,
            r#"{"method":"m","version":"1.0","params":{"a":"1"}}"#,
            "not json",
        ] {
            assert_eq!(dispatcher.dispatch(&message(payload)).await.unwrap(), 0);
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert!(publisher.published.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ack_failure_is_not_fatal() {
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..RecordingPublisher::default()
        });
        let dispatcher = Dispatcher::new(Arc::new(SetPointTable::new(["led"])), publisher);

        let acked = dispatcher
            .dispatch(&message(r#"{"id":"1","method":"m","version":"1.0","params":{"led":"on"}}"#))
            .await
            .unwrap();
        assert_eq!(acked, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (tx, rx) = mpsc::channel(4);
        let publisher = Arc::new(RecordingPublisher::default());
        let dispatcher = Dispatcher::new(Arc::new(SetPointTable::new(["led"])), publisher.clone());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(rx, cancel.clone()));

        tx.send(message(r#"{"id":"7","method":"m","version":"1.0","params":{"led":"off"}}"#))
            .await
            .unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while publisher.published.lock().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        task.await.unwrap();
    }
}
