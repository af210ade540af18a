// ============================================
// File: crates/decada-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Errors raised by the shared identity types, wrapped by every other
//! crate's error enum.
//!
//! ## Main Functionality
//! - `CommonError`: identifier validation and payload encoding failures
//! - `Result<T>`: Type alias using `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never format a `DeviceSecret` or `AccessToken` into an error message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

/// Common result type.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors shared across the agent crates.
///
/// # Example
/// ```
/// use decada_common::error::{CommonError, Result};
///
/// fn check_product_key(key: &str) -> Result<()> {
///     if key.is_empty() {
///         return Err(CommonError::invalid_input("product_key", "cannot be empty"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    /// A field failed validation.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Field name
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Identifier material is shorter than required.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required byte count
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// Host identifier text is not hexadecimal.
    #[error("Malformed host identifier: {details}")]
    MalformedId {
        /// Decoder message
        details: String,
    },

    /// A payload could not be serialized.
    #[error("Encoding error: {context}: {details}")]
    Encoding {
        /// What was being encoded
        context: String,
        /// Serializer message
        details: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Creates an `Encoding` error.
    pub fn encoding(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Encoding {
            context: context.into(),
            details: details.into(),
        }
    }

    /// Returns `true` if the error comes from configured or supplied data
    /// rather than from the agent itself.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Encoding { .. })
    }
}

impl From<hex::FromHexError> for CommonError {
    fn from(err: hex::FromHexError) -> Self {
        Self::MalformedId {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_input("device_uuid", "must be 24 hex characters");
        assert!(err.to_string().contains("device_uuid"));
        assert!(err.to_string().contains("24 hex"));

        let err = CommonError::invalid_length(12, 4);
        assert_eq!(err.to_string(), "Invalid length: expected 12, got 4");
    }

    #[test]
    fn test_error_classification() {
        assert!(CommonError::invalid_input("field", "bad").is_client_error());
        assert!(CommonError::invalid_length(12, 0).is_client_error());
        assert!(!CommonError::encoding("command ack", "oops").is_client_error());
    }

    #[test]
    fn test_hex_error_conversion() {
        let err: CommonError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, CommonError::MalformedId { .. }));
    }
}
