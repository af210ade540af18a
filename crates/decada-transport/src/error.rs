// ============================================
// File: crates/decada-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for the collaborator layer: name resolution,
//! TLS sockets, HTTPS calls, entropy and credential slots.
//!
//! ## Error Categories
//! 1. **Network Errors**: DNS, connect, send/receive, timeouts
//! 2. **TLS Errors**: Credential parsing, handshake failures
//! 3. **HTTP Errors**: Request construction, transport failures
//! 4. **Credential Errors**: Missing or already-installed slots
//!
//! ## ⚠️ Important Note for Next Developer
//! - Network errors are often transient and retryable
//! - Never put PEM contents into an error message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use decada_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Network Errors
    // ========================================

    /// Hostname could not be resolved within the retry budget.
    #[error("DNS resolution failed for '{host}' after {attempts} attempt(s)")]
    DnsResolution {
        /// Hostname being resolved
        host: String,
        /// Attempts made
        attempts: u32,
    },

    /// TCP connection could not be established.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// Remote address
        addr: SocketAddr,
        /// Why the connection failed
        reason: String,
    },

    /// Operation did not complete within its deadline.
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout {
        /// What operation timed out
        operation: String,
        /// How long we waited
        duration_ms: u64,
    },

    /// Peer closed the connection.
    #[error("Connection closed by peer")]
    Closed,

    /// Failed to send data.
    #[error("Send failed: {reason}")]
    SendFailed {
        /// Why send failed
        reason: String,
    },

    /// Failed to receive data.
    #[error("Receive failed: {reason}")]
    RecvFailed {
        /// Why receive failed
        reason: String,
    },

    // ========================================
    // TLS Errors
    // ========================================

    /// TLS configuration or handshake failed.
    #[error("TLS error: {reason}")]
    Tls {
        /// What went wrong
        reason: String,
    },

    // ========================================
    // HTTP Errors
    // ========================================

    /// HTTPS request failed before a response was received.
    #[error("HTTP request failed: {reason}")]
    Http {
        /// What went wrong
        reason: String,
    },

    // ========================================
    // Credential / Entropy Errors
    // ========================================

    /// Credential slot problem.
    #[error("Credential error: {reason}")]
    Credential {
        /// What went wrong
        reason: String,
    },

    /// Entropy source failed.
    #[error("Entropy source failed: {reason}")]
    Entropy {
        /// What went wrong
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `Timeout` error.
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Creates a `Tls` error.
    pub fn tls(reason: impl Into<String>) -> Self {
        Self::Tls {
            reason: reason.into(),
        }
    }

    /// Creates an `Http` error.
    pub fn http(reason: impl Into<String>) -> Self {
        Self::Http {
            reason: reason.into(),
        }
    }

    /// Creates a `Credential` error.
    pub fn credential(reason: impl Into<String>) -> Self {
        Self::Credential {
            reason: reason.into(),
        }
    }

    /// Creates a `SendFailed` error.
    pub fn send(reason: impl Into<String>) -> Self {
        Self::SendFailed {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the operation might succeed if retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DnsResolution { .. }
            | Self::ConnectFailed { .. }
            | Self::Timeout { .. }
            | Self::Http { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }

    /// Returns `true` if this is a deadline expiry.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the connection is unusable.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::SendFailed { .. } | Self::RecvFailed { .. }
        )
    }
}

// ============================================
// Tests
// ============================================
