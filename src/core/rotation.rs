//! Double-buffered window rotation.
//!
//! The controller owns the active sequence that receives updates and the
//! pending sequence awaiting export. Rotation swaps them; the pending side
//! is never updated and the active side is never exported.

use crate::clock::{floor_to_window, window_end_after, Timestamp};
use crate::core::bucket::BucketSequence;

/// Whether buckets are waiting for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Draining,
}

#[derive(Debug)]
pub struct RotationController {
    active: BucketSequence,
    pending: BucketSequence,
    /// Bucket width in seconds
    window_width: i64,
    /// End of the current active window
    window_end: Timestamp,
    record_limit: Option<usize>,
}

impl RotationController {
    /// Opens the first active window around `now`.
    ///
    /// `window_width` must be positive.
    pub fn new(window_width: i64, now: Timestamp, record_limit: Option<usize>) -> Self {
        let window_width = window_width.max(1);
        Self {
            active: BucketSequence::with_record_limit(record_limit),
            pending: BucketSequence::with_record_limit(record_limit),
            window_width,
            window_end: window_end_after(now, window_width),
            record_limit,
        }
    }

    pub fn window_width(&self) -> i64 {
        self.window_width
    }

    pub fn window_end(&self) -> Timestamp {
        self.window_end
    }

    pub fn state(&self) -> RotationState {
        if self.pending.is_empty() {
            RotationState::Idle
        } else {
            RotationState::Draining
        }
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        now >= self.window_end
    }

    /// Rotates if `now` has reached the window boundary.
    pub fn rotate_if_due(&mut self, now: Timestamp) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.rotate(now);
        true
    }

    /// Rotates regardless of the boundary.
    ///
    /// The active sequence becomes pending and a fresh sequence becomes
    /// active. The previous pending sequence must have been drained.
    pub fn rotate(&mut self, now: Timestamp) {
        debug_assert!(
            self.pending.is_empty(),
            "rotating before the previous window was drained"
        );

        self.pending = std::mem::replace(
            &mut self.active,
            BucketSequence::with_record_limit(self.record_limit),
        );
        self.window_end = window_end_after(now, self.window_width);

        tracing::debug!(
            window_end = self.window_end,
            pending_buckets = self.pending.len(),
            "rotated statistics window"
        );
    }

    /// Bucket start for an event whose first packet arrived at `t`, or
    /// `None` if it cannot be represented.
    pub fn bucket_start(&self, t: Timestamp) -> Option<Timestamp> {
        floor_to_window(t, self.window_width)
    }

    pub fn active(&self) -> &BucketSequence {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut BucketSequence {
        &mut self.active
    }

    pub fn pending(&self) -> &BucketSequence {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut BucketSequence {
        &mut self.pending
    }
}
