// ============================================
// File: crates/decada-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for identity generation, CSR building and the
//! session wire protocol.
//!
//! ## Error Categories
//! 1. **Crypto Errors**: Key generation, CSR subject and serialization
//! 2. **Protocol Errors**: Packet framing, envelope shape, topic limits
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - Crypto errors are recoverable: the caller starts over with a new key
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use decada_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for cryptographic and protocol operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Failed to generate a key pair.
    #[error("Key generation failed: {context}")]
    KeyGeneration {
        /// What key was being generated
        context: String,
    },

    /// CSR subject name failed validation.
    #[error("Invalid CSR subject: {reason}")]
    InvalidSubject {
        /// Why the subject was rejected
        reason: String,
    },

    /// CSR could not be built or serialized.
    #[error("CSR generation failed: {reason}")]
    CsrGeneration {
        /// Why CSR generation failed
        reason: String,
    },

    // ========================================
    // Protocol Errors
    // ========================================

    /// Unknown or unsupported control packet type.
    #[error("Unknown packet type: 0x{0:02x}")]
    UnknownPacketType(u8),

    /// Packet is malformed.
    #[error("Malformed packet: {reason}")]
    MalformedPacket {
        /// What's wrong with the packet
        reason: String,
    },

    /// Packet is too short to be valid.
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Packet exceeds the maximum encodable size.
    #[error("Packet too large: max {max} bytes, got {actual}")]
    PacketTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size
        actual: usize,
    },

    /// Too many topics for a single subscribe request.
    #[error("Topic list too long: {count} topics (max {max})")]
    TopicListTooLong {
        /// Number of topics requested
        count: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Inbound command envelope is missing fields or is not JSON.
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope {
        /// What's wrong with the envelope
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `KeyGeneration` error.
    pub fn key_generation(context: impl Into<String>) -> Self {
        Self::KeyGeneration {
            context: context.into(),
        }
    }

    /// Creates an `InvalidSubject` error.
    pub fn invalid_subject(reason: impl Into<String>) -> Self {
        Self::InvalidSubject {
            reason: reason.into(),
        }
    }

    /// Creates a `CsrGeneration` error.
    pub fn csr(reason: impl Into<String>) -> Self {
        Self::CsrGeneration {
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedPacket` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPacket {
            reason: reason.into(),
        }
    }

    /// Creates a `PacketTooShort` error.
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::PacketTooShort { expected, actual }
    }

    /// Creates a `MalformedEnvelope` error.
    pub fn envelope(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    ///
    /// Crypto errors never leave partial state behind; the next
    /// attempt regenerates the key pair from scratch.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::KeyGeneration { .. } | Self::InvalidSubject { .. } | Self::CsrGeneration { .. }
        )
    }

    /// Returns `true` if this is a protocol error.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPacketType(_)
                | Self::MalformedPacket { .. }
                | Self::PacketTooShort { .. }
                | Self::PacketTooLarge { .. }
                | Self::TopicListTooLong { .. }
                | Self::MalformedEnvelope { .. }
        )
    }
}

// ============================================
// Tests
// ============================================
