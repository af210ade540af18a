// ============================================
// File: crates/decada-agent/src/error.rs
// ============================================
//! # Agent Error Types
//!
//! ## Last Modified
//! v0.1.0 - Initial agent errors

use thiserror::Error;

use decada_common::error::CommonError;
use decada_core::error::CoreError;
use decada_transport::error::TransportError;

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("Cloud API error: {reason}")]
    Api {
        reason: String,
    },

    #[error("Device registration gave up after {attempts} attempt(s)")]
    RegistrationExhausted {
        attempts: u32,
    },

    #[error("No valid client certificate")]
    NoCertificate,

    #[error("Broker connection failed after {attempts} attempt(s): {reason}")]
    ConnectFailed {
        attempts: u32,
        reason: String,
    },

    #[error("Broker rejected the connection: {reason}")]
    BrokerRejected {
        reason: String,
    },

    #[error("Session is not connected")]
    NotConnected,

    #[error("Session is already connected")]
    AlreadyConnected,

    #[error("Publish to '{topic}' failed: {reason}")]
    PublishFailed {
        topic: String,
        reason: String,
    },

    #[error("Subscribe failed: {reason}")]
    SubscribeFailed {
        reason: String,
    },

    #[error("Mailbox message length mismatch: declared {declared}, received {actual}")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },

    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Store error: {reason}")]
    Store {
        reason: String,
    },

    #[error("Watchdog error: {reason}")]
    Watchdog {
        reason: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn api(reason: impl Into<String>) -> Self {
        Self::Api {
            reason: reason.into(),
        }
    }

    pub fn publish_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    pub fn watchdog(reason: impl Into<String>) -> Self {
        Self::Watchdog {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Conditions that end the boot cycle and call for a restart.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoCertificate
                | Self::ConnectFailed { .. }
                | Self::PublishFailed { .. }
                | Self::RegistrationExhausted { .. }
                | Self::NotConnected
        )
    }

    /// Errors after which the broker connection cannot be used again.
    #[must_use]
    pub const fn is_connection_loss(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_disconnect(),
            Self::NotConnected => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Api { .. } => true,
            _ => false,
        }
    }
}
