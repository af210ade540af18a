// ============================================
// File: crates/decada-core/src/protocol/envelope.rs
// ============================================
//! # Command and Telemetry Envelopes
//!
//! ## Creation Reason
//! Inbound commands, their acknowledgments and outbound telemetry are JSON
//! documents carried in PUBLISH payloads. This module owns their shapes.
//!
//! ## Shapes
//! ```text
//! inbound   {"id", "method", "version", "params": {k: v, ...}}
//! ack       {"id", "code": 200, "data": {k: v}}
//! telemetry {"id", "version": "1.0",
//!            "params": {"measurepoints": {k: v}},
//!            "method": "thing.measurepoint.post"}
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A missing `id`, `method`, `version` or `params` rejects the whole
//!   envelope; callers drop it with a warning
//! - Non-string parameter values are kept as their JSON text
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Method name for telemetry posts.
pub const METHOD_MEASUREPOINT_POST: &str = "thing.measurepoint.post";

/// Envelope version used for telemetry.
pub const TELEMETRY_VERSION: &str = "1.0";

/// Code returned in every successful acknowledgment.
pub const ACK_CODE_OK: u16 = 200;

// ============================================
// CommandEnvelope
// ============================================

#[derive(Deserialize)]
struct RawEnvelope {
    id: Option<Value>,
    method: Option<String>,
    version: Option<String>,
    params: Option<serde_json::Map<String, Value>>,
}

/// A validated inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEnvelope {
    /// Request identifier echoed in the acknowledgment.
    pub id: String,
    /// Service method, e.g. `thing.service.measurepoint.set`.
    pub method: String,
    /// Envelope version.
    pub version: String,
    /// Parameter name to value.
    pub params: BTreeMap<String, String>,
}

impl CommandEnvelope {
    /// Parses and validates an inbound payload.
    ///
    /// # Errors
    /// Returns `MalformedEnvelope` if the payload is not a JSON object or
    /// any required field is missing or mistyped.
    ///
    /// # Example
    /// ```
    /// use decada_core::protocol::CommandEnvelope;
    ///
    /// let payload = br#"{"id":"1","method":"m","version":"1.0","params":{"led":"on"}}"#;
    /// let cmd = CommandEnvelope::parse(payload).unwrap();
    /// assert_eq!(cmd.params["led"], "on");
    ///
    /// let missing = br#"{"id":"1","method":"m","version":"1.0"}"#;
    /// assert!(CommandEnvelope::parse(missing).is_err());
    /// ```
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_slice(payload)
            .map_err(|e| CoreError::envelope(format!("invalid JSON: {e}")))?;

        let id = match raw.id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            Some(_) => return Err(CoreError::envelope("id must be a string or number")),
            None => return Err(CoreError::envelope("missing id")),
        };
        let method = raw.method.ok_or_else(|| CoreError::envelope("missing method"))?;
        let version = raw.version.ok_or_else(|| CoreError::envelope("missing version"))?;
        let params = raw
            .params
            .ok_or_else(|| CoreError::envelope("missing params"))?
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        Ok(Self {
            id,
            method,
            version,
            params,
        })
    }
}

// ============================================
// CommandAck
// ============================================

/// Acknowledgment published on the reply topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    /// Identifier of the acknowledged command.
    pub id: String,
    /// Result code.
    pub code: u16,
    /// Result data.
    pub data: BTreeMap<String, String>,
}

impl CommandAck {
    /// Builds a success acknowledgment carrying one result entry.
    #[must_use]
    pub fn ok(id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut data = BTreeMap::new();
        data.insert(key.into(), value.into());
        Self {
            id: id.into(),
            code: ACK_CODE_OK,
            data,
        }
    }

    /// Serializes to JSON.
    ///
    /// # Errors
    /// Returns an encoding error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            CoreError::Common(decada_common::CommonError::encoding("command ack", e.to_string()))
        })
    }
}

// ============================================
// MeasurepointPost
// ============================================

/// Telemetry parameter block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurepointParams {
    /// Measure point name to value.
    pub measurepoints: BTreeMap<String, String>,
}

/// Outbound telemetry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurepointPost {
    /// Message identifier (the device UUID).
    pub id: String,
    /// Envelope version.
    pub version: String,
    /// Measure points.
    pub params: MeasurepointParams,
    /// Method name.
    pub method: String,
}

impl MeasurepointPost {
    /// Builds a telemetry post with a single measure point.
    #[must_use]
    pub fn single(id: impl Into<String>, point: impl Into<String>, value: impl Into<String>) -> Self {
        let mut measurepoints = BTreeMap::new();
        measurepoints.insert(point.into(), value.into());
        Self {
            id: id.into(),
            version: TELEMETRY_VERSION.into(),
            params: MeasurepointParams { measurepoints },
            method: METHOD_MEASUREPOINT_POST.into(),
        }
    }

    /// Serializes to JSON.
    ///
    /// # Errors
    /// Returns an encoding error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            CoreError::Common(decada_common::CommonError::encoding("measurepoint post", e.to_string()))
        })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_envelope() {
        let payload = br#"{"id":"42","method":"thing.service.measurepoint.set","version":"1.0","params":{"chronos_s":"1700000000","count":3,"flag":true}}"#;
        let cmd = CommandEnvelope::parse(payload).unwrap();
        assert_eq!(cmd.id, "42");
        assert_eq!(cmd.method, "thing.service.measurepoint.set");
        assert_eq!(cmd.params["chronos_s"], "1700000000");
        assert_eq!(cmd.params["count"], "3");
        assert_eq!(cmd.params["flag"], "true");
    }

    #[test]
    fn test_numeric_id_accepted() {
        let payload = br#"{"id":7,"method":"m","version":"1.0","params":{}}"#;
        assert_eq!(CommandEnvelope::parse(payload).unwrap().id, "7");
    }

    #[test]
    fn test_missing_fields_rejected() {
        for payload in [
            &br#"{"method":"m","version":"1.0","params":{}}"#[..],
            br#"{"id":"1","version":"1.0","params":{}}"#,
            br#"{"id":"1","method":"m","params":{}}"#,
            br#"{"id":"1","method":"m","version":"1.0"}"#,
            br#"{"id":"1","method":"m","version":"1.0","params":[]}"#,
            br#"{"id":{},"method":"m","version":"1.0","params":{}}"#,
            b"not json",
            b"[]",
        ] {
            let err = CommandEnvelope::parse(payload).unwrap_err();
            assert!(matches!(err, CoreError::MalformedEnvelope { .. }), "{payload:?}");
        }
    }

    #[test]
    fn test_ack_json_shape() {
        let ack = CommandAck::ok("42", "chronos_s", "1700000000");
        assert_eq!(
            ack.to_json().unwrap(),
            r#"{"id":"42","code":200,"data":{"chronos_s":"1700000000"}}"#
        );
    }

    #[test]
    fn test_measurepoint_post_shape() {
        let post = MeasurepointPost::single("0a1b2c3d4e5f60718293a4b5", "chronos_s", "1700000000");
        assert_eq!(
            post.to_json().unwrap(),
            r#"{"id":"0a1b2c3d4e5f60718293a4b5","version":"1.0","params":{"measurepoints":{"chronos_s":"1700000000"}},"method":"thing.measurepoint.post"}"#
        );
    }
}
