// ============================================
// File: crates/decada-agent/src/services/restart.rs
// ============================================
//! # Restart Hook
//!
//! Fatal conditions (no certificate, failed connect, failed publish,
//! starved watchdog) end the boot cycle with a warm restart instead of
//! continuing in an ambiguous security state.
//!
//! `ProcessRestarter` records the first reason and cancels the agent's
//! shutdown token; `main` then exits with [`RESTART_EXIT_CODE`] so the
//! service manager starts a fresh process.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Exit status requesting a restart from the service manager (`EX_TEMPFAIL`).
pub const RESTART_EXIT_CODE: i32 = 75;

/// Restart hook.
pub trait Restarter: Send + Sync {
    /// Requests a restart.
    fn restart(&self, reason: &str);
}

/// Production restart hook. Fires at most once.
#[derive(Debug)]
pub struct ProcessRestarter {
    fired: AtomicBool,
    reason: Mutex<Option<String>>,
    shutdown: CancellationToken,
}

impl ProcessRestarter {
    /// Creates a hook that cancels `shutdown` when it fires.
    #[must_use]
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            fired: AtomicBool::new(false),
            reason: Mutex::new(None),
            shutdown,
        }
    }

    /// Reason of the restart, once requested.
    #[must_use]
    pub fn requested(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

impl Restarter for ProcessRestarter {
    fn restart(&self, reason: &str) {
        if self.fired.swap(true, Ordering::SeqCst) {
            warn!(reason, "Restart already requested, ignoring");
            return;
        }
        error!(reason, "Restarting agent");
        *self.reason.lock() = Some(reason.to_string());
        self.shutdown.cancel();
    }
}

/// Restart hook that records every call.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CountingRestarter {
    reasons: Mutex<Vec<String>>,
}

#[cfg(test)]
impl CountingRestarter {
    pub(crate) fn count(&self) -> usize {
        self.reasons.lock().len()
    }

    pub(crate) fn reasons(&self) -> Vec<String> {
        self.reasons.lock().clone()
    }
}

#[cfg(test)]
impl Restarter for CountingRestarter {
    fn restart(&self, reason: &str) {
        self.reasons.lock().push(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_restarter_fires_once() {
        let shutdown = CancellationToken::new();
        let restarter = ProcessRestarter::new(shutdown.clone());
        assert!(restarter.requested().is_none());

        restarter.restart("no certificate");
        restarter.restart("second");

        assert!(shutdown.is_cancelled());
        assert_eq!(restarter.requested().as_deref(), Some("no certificate"));
    }
}
