// ============================================
// File: crates/decada-core/src/protocol/topics.rs
// ============================================
//! # Topic Builder
//!
//! Topics are slash-delimited and parameterized by product key and device
//! key (the device UUID):
//!
//! ```text
//! /sys/{productKey}/{deviceKey}/thing/measurepoint/post          (publish)
//! /sys/{productKey}/{deviceKey}/thing/service/measurepoint/set   (subscribe)
//! <inbound topic>_reply                                          (ack)
//! ```

/// Suffix appended to an inbound topic to form its reply topic.
pub const REPLY_SUFFIX: &str = "_reply";

/// Topic names for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    prefix: String,
}

impl TopicSet {
    /// Creates the topic set for `product_key` / `device_key`.
    #[must_use]
    pub fn new(product_key: &str, device_key: &str) -> Self {
        Self {
            prefix: format!("/sys/{product_key}/{device_key}"),
        }
    }

    /// Telemetry publish topic.
    #[must_use]
    pub fn measurepoint_post(&self) -> String {
        format!("{}/thing/measurepoint/post", self.prefix)
    }

    /// Measure point set command topic.
    #[must_use]
    pub fn measurepoint_set(&self) -> String {
        format!("{}/thing/service/measurepoint/set", self.prefix)
    }

    /// Topics subscribed after connecting.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        vec![self.measurepoint_set()]
    }

    /// Reply topic for a command received on `inbound`.
    #[must_use]
    pub fn reply_topic(inbound: &str) -> String {
        format!("{inbound}{REPLY_SUFFIX}")
    }
}
