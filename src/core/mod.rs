//! Core functionality of the statistics aggregator.
//!
//! This module contains:
//! - Per-application records and display-name resolution
//! - Time buckets and their ordered sequence
//! - Double-buffered window rotation
//! - Export of drained windows to the sink
//! - The aggregator entry points tying them together

pub mod bucket;
pub mod export;
pub mod record;
pub mod rotation;
pub mod stats;

// Re-export commonly used types
pub use bucket::{Bucket, BucketSequence};
pub use export::{format_record_line, DrainReport, Exporter};
pub use record::{
    resolve_display_name, ApplicationRecord, RecordStore, StatsError, MAX_APP_NAME_LEN,
};
pub use rotation::{RotationController, RotationState};
pub use stats::AppIdStatistics;
