// ============================================
// File: crates/decada-agent/src/services/mailbox.rs
// ============================================
//! # Producer/Consumer Mailbox
//!
//! Bounded hand-off between the telemetry producer and the session
//! consumer. Every message carries the length the producer declared; the
//! receiver compares it with the bytes actually delivered and reports a
//! mismatch as corruption.
//!
//! ```text
//! producer ── send(payload) ──► [ declared_len | payload ] ──► recv() ── consumer
//!                                                               │
//!                                         len != declared ──► LengthMismatch
//! ```

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{AgentError, Result};

struct Envelope {
    declared_len: usize,
    payload: Bytes,
}

/// Creates a mailbox with `capacity` slots (at least one).
#[must_use]
pub fn mailbox(capacity: usize) -> (MailboxSender, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MailboxSender { tx }, MailboxReceiver { rx })
}

/// Producer side.
#[derive(Clone)]
pub struct MailboxSender {
    tx: mpsc::Sender<Envelope>,
}

impl MailboxSender {
    /// Enqueues `payload`, waiting for a free slot.
    ///
    /// # Errors
    /// Returns `MailboxClosed` once the receiver is gone.
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<usize> {
        let payload = payload.into();
        let declared_len = payload.len();
        self.send_envelope(Envelope {
            declared_len,
            payload,
        })
        .await?;
        debug!(len = declared_len, "Mailbox message enqueued");
        Ok(declared_len)
    }

    async fn send_envelope(&self, envelope: Envelope) -> Result<()> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| AgentError::MailboxClosed)
    }

    #[cfg(test)]
    pub(crate) async fn send_with_declared_len(&self, payload: Bytes, declared_len: usize) -> Result<()> {
        self.send_envelope(Envelope {
            declared_len,
            payload,
        })
        .await
    }
}

/// Consumer side.
pub struct MailboxReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl MailboxReceiver {
    /// Waits for the next message.
    ///
    /// # Errors
    /// - `MailboxClosed` once every sender is gone and the queue is empty
    /// - `LengthMismatch` if the delivered size differs from the declared
    ///   size; the message is discarded
    pub async fn recv(&mut self) -> Result<Bytes> {
        let envelope = self.rx.recv().await.ok_or(AgentError::MailboxClosed)?;
        let actual = envelope.payload.len();
        if actual != envelope.declared_len {
            error!(
                declared = envelope.declared_len,
                actual, "Mailbox message length mismatch"
            );
            return Err(AgentError::LengthMismatch {
                declared: envelope.declared_len,
                actual,
            });
        }
        debug!(len = actual, "Mailbox message dequeued");
        Ok(envelope.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_length_preserved() {
        let (tx, mut rx) = mailbox(1);
        assert_eq!(tx.send("1700000000").await.unwrap(), 10);
        let payload = rx.recv().await.unwrap();
        assert_eq!(payload.len(), 10);
        assert_eq!(&payload[..], b"1700000000");
    }

    #[tokio::test]
    async fn test_mismatch_detected() {
        let (tx, mut rx) = mailbox(2);
        tx.send_with_declared_len(Bytes::from_static(b"170000000"), 10).await.unwrap();
        tx.send("ok").await.unwrap();

        let err = rx.recv().await.unwrap_err();
        assert!(matches!(err, AgentError::LengthMismatch { declared: 10, actual: 9 }));
        assert_eq!(&rx.recv().await.unwrap()[..], b"ok");
    }

    #[tokio::test]
    async fn test_closed_when_senders_dropped() {
        let (tx, mut rx) = mailbox(1);
        drop(tx);
        assert!(matches!(rx.recv().await, Err(AgentError::MailboxClosed)));
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (tx, rx) = mailbox(1);
        drop(rx);
        assert!(matches!(tx.send("x").await, Err(AgentError::MailboxClosed)));
    }
}
