// ============================================
// File: crates/decada-agent/src/logging.rs
// ============================================
//! # Logging Setup
//!
//! ## Creation Reason
//! The subscriber has to exist before the configuration is read, so that
//! load errors are reported, but the level comes from `[logging] level`.
//! The filter therefore sits behind a reload layer and is swapped once the
//! configuration is known.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RUST_LOG`, when set, pins the filter; the configured level is
//!   ignored
//!
//! ## Last Modified
//! v0.1.0 - Initial logging setup

use tracing::Subscriber;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use crate::error::{AgentError, Result};

/// Handle for changing the active log filter.
#[derive(Debug, Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogControl {
    /// Replaces the filter with `level` unless `RUST_LOG` pinned it.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if `level` is not a valid filter directive.
    pub fn set_level(&self, level: &str) -> Result<()> {
        if self.pinned {
            return Ok(());
        }
        let filter = EnvFilter::try_new(level)
            .map_err(|e| AgentError::config_invalid("logging.level", e.to_string()))?;
        self.handle
            .reload(filter)
            .map_err(|e| AgentError::internal(format!("log filter reload: {e}")))
    }
}

/// Builds the subscriber stack: reloadable filter under a `fmt` layer.
///
/// `pinned` marks the filter as coming from the environment.
pub fn subscriber(
    filter: EnvFilter,
    pinned: bool,
) -> (impl Subscriber + Send + Sync + 'static, LogControl) {
    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true));
    (subscriber, LogControl { handle, pinned })
}

/// Installs the global subscriber. Returns `None` if one is already set.
pub fn init(default_level: &str) -> Option<LogControl> {
    let (filter, pinned) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(default_level), false),
    };
    let (subscriber, control) = subscriber(filter, pinned);
    subscriber.try_init().ok()?;
    Some(control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_configured_level_replaces_default() {
        let (subscriber, control) = subscriber(EnvFilter::new("info"), false);
        tracing::subscriber::with_default(subscriber, || {
            assert!(!tracing::enabled!(Level::DEBUG));
            control.set_level("debug").unwrap();
            assert!(tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn test_pinned_filter_kept() {
        let (subscriber, control) = subscriber(EnvFilter::new("warn"), true);
        tracing::subscriber::with_default(subscriber, || {
            control.set_level("trace").unwrap();
            assert!(!tracing::enabled!(Level::TRACE));
        });
    }

    #[test]
    fn test_invalid_level_rejected() {
        let (_subscriber, control) = subscriber(EnvFilter::new("info"), false);
        let err = control.set_level("decada=loud").unwrap_err();
        assert!(err.is_config_error());
    }
}
