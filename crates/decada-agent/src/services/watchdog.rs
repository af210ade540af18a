// ============================================
// File: crates/decada-agent/src/services/watchdog.rs
// ============================================
//! # Software Watchdog
//!
//! ## Creation Reason
//! Long-running provisioning steps (key generation, registration retry,
//! HTTPS round-trips) must prove liveness on a fixed window. Each activity
//! owns a channel and feeds it; a supervisor restarts the agent when any
//! channel starves.
//!
//! ## Main Functionality
//! - `Watchdog`: Channel installation and feeding
//! - `WatchdogHandle`: A channel bound to its watchdog, cloned into tasks
//! - `SoftwareWatchdog`: `AtomicInstant` deadlines plus a supervisor task
//!
//! ## Supervision
//! ```text
//! install_channel("communications") ─┐
//! install_channel("telemetry") ──────┼─► spawn_supervisor ──► every window/5:
//!                                    │        any channel idle > window?
//!                                    │              │ yes
//!                                    │              ▼
//!                                    └──────► Restarter::restart(reason)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Channels must be installed before the supervisor starts
//! - Feeding never blocks and never fails
//!
//! ## Last Modified
//! v0.1.0 - Initial watchdog

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use decada_common::time::AtomicInstant;

use super::restart::Restarter;
use crate::error::{AgentError, Result};

/// Identifier of an installed channel.
pub type ChannelId = usize;

// ============================================
// Watchdog Trait
// ============================================

/// A multi-channel watchdog.
pub trait Watchdog: Send + Sync {
    /// Installs a channel.
    ///
    /// # Errors
    /// Returns `Watchdog` if channels can no longer be installed.
    fn install_channel(&self, name: &str) -> Result<ChannelId>;

    /// Resets the deadline of `channel`.
    fn feed(&self, channel: ChannelId);
}

/// A channel together with the watchdog that owns it.
#[derive(Clone)]
pub struct WatchdogHandle {
    watchdog: Arc<dyn Watchdog>,
    channel: ChannelId,
}

impl WatchdogHandle {
    /// Installs `name` on `watchdog` and returns its handle.
    ///
    /// # Errors
    /// Propagates the installation error.
    pub fn install(watchdog: Arc<dyn Watchdog>, name: &str) -> Result<Self> {
        let channel = watchdog.install_channel(name)?;
        Ok(Self { watchdog, channel })
    }

    /// Feeds the channel.
    pub fn feed(&self) {
        self.watchdog.feed(self.channel);
    }

    /// Channel identifier.
    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }
}

impl fmt::Debug for WatchdogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchdogHandle")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

// ============================================
// SoftwareWatchdog
// ============================================

struct Channel {
    name: String,
    last_feed: AtomicInstant,
}

/// Watchdog with per-channel deadlines checked by a supervisor task.
pub struct SoftwareWatchdog {
    window: Duration,
    channels: RwLock<Vec<Channel>>,
    started: AtomicBool,
}

impl SoftwareWatchdog {
    /// Creates a watchdog whose channels must be fed every `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            channels: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Feed window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Name of the first channel that has not been fed within the window.
    #[must_use]
    pub fn starved_channel(&self) -> Option<String> {
        self.channels
            .read()
            .iter()
            .find(|c| c.last_feed.has_elapsed(self.window))
            .map(|c| c.name.clone())
    }

    /// Starts the supervisor. Channel deadlines restart from now.
    ///
    /// The task ends after triggering one restart or when `shutdown` is
    /// cancelled.
    pub fn spawn_supervisor(
        self: &Arc<Self>,
        restarter: Arc<dyn Restarter>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        self.started.store(true, Ordering::SeqCst);
        for channel in self.channels.read().iter() {
            channel.last_feed.touch();
        }

        let watchdog = Arc::clone(self);
        let check_every = (self.window / 5).max(Duration::from_millis(10));
        info!(
            window_ms = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX),
            channels = self.channels.read().len(),
            "Watchdog supervisor started"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_every);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("Watchdog supervisor stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Some(name) = watchdog.starved_channel() {
                            error!(channel = %name, "Watchdog channel starved");
                            restarter.restart(&format!("watchdog channel '{name}' starved"));
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl Watchdog for SoftwareWatchdog {
    fn install_channel(&self, name: &str) -> Result<ChannelId> {
        if self.started.load(Ordering::SeqCst) {
            return Err(AgentError::watchdog(format!(
                "cannot install '{name}' after the supervisor started"
            )));
        }
        let mut channels = self.channels.write();
        channels.push(Channel {
            name: name.to_string(),
            last_feed: AtomicInstant::now(),
        });
        debug!(channel = name, id = channels.len() - 1, "Watchdog channel installed");
        Ok(channels.len() - 1)
    }

    fn feed(&self, channel: ChannelId) {
        if let Some(c) = self.channels.read().get(channel) {
            c.last_feed.touch();
        }
    }
}

impl fmt::Debug for SoftwareWatchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareWatchdog")
            .field("window", &self.window)
            .field("channels", &self.channels.read().len())
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish()
    }
}

// ============================================
// Test Support
// ============================================

/// Watchdog that only counts feeds.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CountingWatchdog {
    feeds: parking_lot::Mutex<Vec<usize>>,
}

#[cfg(test)]
impl CountingWatchdog {
    pub(crate) fn handle(self: &Arc<Self>, name: &str) -> WatchdogHandle {
        WatchdogHandle::install(Arc::clone(self) as Arc<dyn Watchdog>, name).unwrap()
    }

    pub(crate) fn feeds(&self, channel: ChannelId) -> usize {
        self.feeds.lock().get(channel).copied().unwrap_or(0)
    }
}

#[cfg(test)]
impl Watchdog for CountingWatchdog {
    fn install_channel(&self, _name: &str) -> Result<ChannelId> {
        let mut feeds = self.feeds.lock();
        feeds.push(0);
        Ok(feeds.len() - 1)
    }

    fn feed(&self, channel: ChannelId) {
        if let Some(count) = self.feeds.lock().get_mut(channel) {
            *count += 1;
        }
    }
}

// ============================================
// Tests
// ============================================
