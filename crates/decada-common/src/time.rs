// ============================================
// File: crates/decada-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Every signed REST call, every CSR subject and every session password
//! embeds a timestamp, and the watchdog tracks per-channel feed times.
//! This module provides both without tying callers to the system clock.
//!
//! ## Main Functionality
//! - `Clock`: Wall-clock abstraction (`now_ms`, `now_unix_seconds`)
//! - `SystemClock`: Production clock, optionally truncated to whole seconds
//! - `ManualClock`: Settable clock for deterministic tests
//! - `AtomicInstant`: Lock-free monotonic timestamp for watchdog channels
//!
//! ## ⚠️ Important Note for Next Developer
//! - The device RTC only has second resolution; the cloud still expects
//!   millisecond timestamps, so `SystemClock::second_resolution()` renders
//!   them as `secs * 1000`
//! - `AtomicInstant` uses `AtomicU64` internally (nanoseconds since start)
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

// ============================================
// Clock
// ============================================

/// Source of wall-clock time.
///
/// Implementations must be cheap to call; timestamps are taken once per
/// request and once per connection attempt.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Whole seconds since the Unix epoch.
    fn now_unix_seconds(&self) -> i64;

    /// Millisecond timestamp rendered as a decimal string, the form every
    /// signature and CSR subject embeds.
    fn timestamp_ms_string(&self) -> String {
        self.now_ms().to_string()
    }
}

// ============================================
// SystemClock
// ============================================

/// Clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    second_resolution: bool,
}

impl SystemClock {
    /// Creates a clock with full millisecond resolution.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            second_resolution: false,
        }
    }

    /// Creates a clock that mimics a second-resolution RTC.
    #[must_use]
    pub const fn second_resolution() -> Self {
        Self {
            second_resolution: true,
        }
    }

    fn since_epoch() -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        let elapsed = Self::since_epoch();
        if self.second_resolution {
            elapsed.as_secs().saturating_mul(1000)
        } else {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        }
    }

    fn now_unix_seconds(&self) -> i64 {
        i64::try_from(Self::since_epoch().as_secs()).unwrap_or(i64::MAX)
    }
}

// ============================================
// ManualClock
// ============================================

/// Clock whose value is set explicitly.
///
/// # Example
/// ```
/// use decada_common::time::{Clock, ManualClock};
///
/// let clock = ManualClock::from_secs(1_700_000_000);
/// assert_eq!(clock.now_ms(), 1_700_000_000_000);
/// clock.advance_secs(5);
/// assert_eq!(clock.now_unix_seconds(), 1_700_000_005);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a clock fixed at the given Unix second.
    #[must_use]
    pub fn from_secs(secs: i64) -> Self {
        Self {
            millis: AtomicI64::new(secs.saturating_mul(1000)),
        }
    }

    /// Sets the clock to the given millisecond timestamp.
    pub fn set_ms(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs` seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.millis.fetch_add(secs.saturating_mul(1000), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.millis.load(Ordering::SeqCst)).unwrap_or(0)
    }

    fn now_unix_seconds(&self) -> i64 {
        self.millis.load(Ordering::SeqCst) / 1000
    }
}

// ============================================
// AtomicInstant
// ============================================

/// Thread-safe wrapper around [`Instant`] for concurrent access.
///
/// Stores nanoseconds elapsed since a process-wide reference instant.
/// Watchdog channels store their last feed time here so that feeding
/// never takes a lock.
///
/// # Example
/// ```
/// use decada_common::time::AtomicInstant;
/// use std::time::Duration;
///
/// let last_feed = AtomicInstant::now();
/// last_feed.touch();
/// assert!(!last_feed.has_elapsed(Duration::from_secs(60)));
/// ```
#[derive(Debug)]
pub struct AtomicInstant {
    nanos: AtomicU64,
}

impl AtomicInstant {
    fn reference() -> Instant {
        use std::sync::OnceLock;
        static REFERENCE: OnceLock<Instant> = OnceLock::new();
        *REFERENCE.get_or_init(Instant::now)
    }

    fn to_nanos(instant: Instant) -> u64 {
        instant
            .checked_duration_since(Self::reference())
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Creates a new `AtomicInstant` set to the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Creates a new `AtomicInstant` from an `Instant`.
    #[must_use]
    pub fn from_instant(instant: Instant) -> Self {
        Self {
            nanos: AtomicU64::new(Self::to_nanos(instant)),
        }
    }

    /// Loads the stored instant.
    #[must_use]
    pub fn load(&self) -> Instant {
        Self::reference() + Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    /// Stores a new instant.
    pub fn store(&self, instant: Instant) {
        self.nanos.store(Self::to_nanos(instant), Ordering::Release);
    }

    /// Updates to the current time and returns the previous value.
    pub fn touch(&self) -> Instant {
        let old = self.load();
        self.store(Instant::now());
        old
    }

    /// Returns the elapsed time since the stored instant.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.load().elapsed()
    }

    /// Checks if more than `duration` has elapsed since the stored instant.
    #[must_use]
    pub fn has_elapsed(&self, duration: Duration) -> bool {
        self.elapsed() > duration
    }
}

impl Default for AtomicInstant {
    fn default() -> Self {
        Self::now()
    }
}

// ============================================
// Tests
// ============================================
