// ============================================
// File: crates/devauth-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Challenges are derived from a high-resolution timestamp, and two
//! challenges issued back-to-back must never share one. The system clock
//! alone does not guarantee that (coarse clock sources, NTP steps), so this
//! module provides a strictly increasing nanosecond clock on top of it.
//!
//! ## Main Functionality
//! - `MonotonicNanos`: lock-free, strictly increasing Unix nanoseconds
//! - `unix_timestamp_nanos`: raw wall-clock reading
//!
//! ## ⚠️ Important Note for Next Developer
//! - `MonotonicNanos` may run ahead of the wall clock under heavy load;
//!   it is an ordering source, not a time-of-day source
//! - Values are `u64` nanoseconds since the Unix epoch (valid until 2554)
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================
// Wall Clock Readings
// ============================================

/// Returns the current Unix timestamp in nanoseconds.
///
/// A clock set before the Unix epoch reads as `0`.
#[must_use]
pub fn unix_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// ============================================
// MonotonicNanos
// ============================================

/// Strictly increasing nanosecond timestamp source.
///
/// Each call to [`next`](Self::next) returns `max(now, last + 1)`, so
/// successive readings from the same source are always distinct even if
/// the wall clock stalls or steps backwards.
///
/// # Example
/// ```
/// use devauth_common::time::MonotonicNanos;
///
/// let clock = MonotonicNanos::new();
/// let a = clock.next();
/// let b = clock.next();
/// assert!(b > a);
/// ```
#[derive(Debug, Default)]
pub struct MonotonicNanos {
    last: AtomicU64,
}

impl MonotonicNanos {
    /// Creates a new clock source.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Returns the next strictly increasing timestamp.
    pub fn next(&self) -> u64 {
        let now = unix_timestamp_nanos();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(observed) => current = observed,
            }
        }
    }

    /// Returns the last value handed out (0 if none yet).
    #[must_use]
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

// ============================================
// Tests
// ============================================
