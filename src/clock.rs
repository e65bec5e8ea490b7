//! Wall-clock sources for window rotation.
//!
//! Timestamps are whole unix seconds, matching the resolution of the
//! first-packet times reported by the classification engine.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Unix time in seconds.
pub type Timestamp = i64;

/// Supplies the current wall-clock time.
pub trait Clock: Send {
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp()
    }
}

/// A manually driven clock.
///
/// Clones share the same underlying time, so a handle kept by the caller
/// can move the clock seen by an aggregator.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Moves the clock forward to `now`, never backwards.
    pub fn advance_to(&self, now: Timestamp) {
        self.now.fetch_max(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Floors `t` to the start of its `width`-second window.
///
/// Returns `None` when that start lies below `Timestamp::MIN`.
pub fn floor_to_window(t: Timestamp, width: i64) -> Option<Timestamp> {
    t.checked_sub(t.rem_euclid(width))
}

/// End of the `width`-second window containing `t`, saturating at
/// `Timestamp::MAX`.
pub fn window_end_after(t: Timestamp, width: i64) -> Timestamp {
    t.saturating_add(width - t.rem_euclid(width))
}
