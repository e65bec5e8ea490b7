//! Operator-visible counters for the statistics aggregator.
//!
//! Dropped contributions and failed drains are never fatal, so these
//! counters are how an operator notices them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Aggregator counters for the current process.
#[derive(Debug)]
pub struct StatsTelemetry {
    /// Flow-stats events folded into a bucket
    events_processed: AtomicU64,
    /// Flow-stats events dropped for an unrepresentable timestamp
    events_rejected: AtomicU64,
    /// Application records created
    records_created: AtomicU64,
    /// Per-application contributions dropped on insert failure
    contributions_dropped: AtomicU64,
    /// Window rotations performed
    rotations: AtomicU64,
    /// Buckets with records written to the sink
    buckets_exported: AtomicU64,
    /// Buckets drained without records
    empty_buckets_skipped: AtomicU64,
    /// Lines written to the sink
    lines_written: AtomicU64,
    /// Drains that lost data to a sink failure
    drain_failures: AtomicU64,
    /// Process start time
    started: DateTime<Utc>,
    /// Path for persisting counters
    persist_path: Option<PathBuf>,
}

impl StatsTelemetry {
    pub fn new() -> Self {
        Self {
            events_processed: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            records_created: AtomicU64::new(0),
            contributions_dropped: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            buckets_exported: AtomicU64::new(0),
            empty_buckets_skipped: AtomicU64::new(0),
            lines_written: AtomicU64::new(0),
            drain_failures: AtomicU64::new(0),
            started: Utc::now(),
            persist_path: None,
        }
    }

    /// Create telemetry that continues cumulative counters stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut telemetry = Self::new();
        telemetry.persist_path = Some(path);

        if let Err(e) = telemetry.load() {
            tracing::warn!(error = %e, "could not load previous aggregator telemetry");
        }

        telemetry
    }

    pub fn record_event(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_created(&self) {
        self.records_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.contributions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_buckets_exported(&self, buckets: u64, lines: u64) {
        self.buckets_exported.fetch_add(buckets, Ordering::Relaxed);
        self.lines_written.fetch_add(lines, Ordering::Relaxed);
    }

    pub fn record_empty_buckets(&self, buckets: u64) {
        self.empty_buckets_skipped.fetch_add(buckets, Ordering::Relaxed);
    }

    pub fn record_drain_failure(&self) {
        self.drain_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            records_created: self.records_created.load(Ordering::Relaxed),
            contributions_dropped: self.contributions_dropped.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            buckets_exported: self.buckets_exported.load(Ordering::Relaxed),
            empty_buckets_skipped: self.empty_buckets_skipped.load(Ordering::Relaxed),
            lines_written: self.lines_written.load(Ordering::Relaxed),
            drain_failures: self.drain_failures.load(Ordering::Relaxed),
            started: self.started,
            uptime_secs: (Utc::now() - self.started).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        self.snapshot().summary()
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let snapshot = self.snapshot();
            let persisted = PersistedTelemetry {
                events_processed: snapshot.events_processed,
                events_rejected: snapshot.events_rejected,
                records_created: snapshot.records_created,
                contributions_dropped: snapshot.contributions_dropped,
                rotations: snapshot.rotations,
                buckets_exported: snapshot.buckets_exported,
                empty_buckets_skipped: snapshot.empty_buckets_skipped,
                lines_written: snapshot.lines_written,
                drain_failures: snapshot.drain_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = read_persisted(path)?;

                self.events_processed
                    .store(persisted.events_processed, Ordering::Relaxed);
                self.events_rejected
                    .store(persisted.events_rejected, Ordering::Relaxed);
                self.records_created
                    .store(persisted.records_created, Ordering::Relaxed);
                self.contributions_dropped
                    .store(persisted.contributions_dropped, Ordering::Relaxed);
                self.rotations.store(persisted.rotations, Ordering::Relaxed);
                self.buckets_exported
                    .store(persisted.buckets_exported, Ordering::Relaxed);
                self.empty_buckets_skipped
                    .store(persisted.empty_buckets_skipped, Ordering::Relaxed);
                self.lines_written
                    .store(persisted.lines_written, Ordering::Relaxed);
                self.drain_failures
                    .store(persisted.drain_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for StatsTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub events_processed: u64,
    pub events_rejected: u64,
    pub records_created: u64,
    pub contributions_dropped: u64,
    pub rotations: u64,
    pub buckets_exported: u64,
    pub empty_buckets_skipped: u64,
    pub lines_written: u64,
    pub drain_failures: u64,
    pub started: DateTime<Utc>,
    pub uptime_secs: u64,
}

impl TelemetrySnapshot {
    pub fn summary(&self) -> String {
        format!(
            "Aggregator Statistics:\n\
             - Flow events processed: {}\n\
             - Flow events rejected: {}\n\
             - Application records created: {}\n\
             - Contributions dropped: {}\n\
             - Window rotations: {}\n\
             - Buckets exported: {}\n\
             - Empty buckets skipped: {}\n\
             - Lines written: {}\n\
             - Failed drains: {}",
            self.events_processed,
            self.events_rejected,
            self.records_created,
            self.contributions_dropped,
            self.rotations,
            self.buckets_exported,
            self.empty_buckets_skipped,
            self.lines_written,
            self.drain_failures,
        )
    }
}

/// Counter format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedTelemetry {
    pub events_processed: u64,
    #[serde(default)]
    pub events_rejected: u64,
    pub records_created: u64,
    pub contributions_dropped: u64,
    pub rotations: u64,
    pub buckets_exported: u64,
    pub empty_buckets_skipped: u64,
    pub lines_written: u64,
    pub drain_failures: u64,
    pub last_updated: DateTime<Utc>,
}

/// Reads counters persisted by [`StatsTelemetry::save`].
pub fn read_persisted(path: &std::path::Path) -> Result<PersistedTelemetry, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(std::io::Error::other)
}

/// Telemetry shared between an aggregator and its host.
pub type SharedTelemetry = Arc<StatsTelemetry>;

pub fn create_shared_telemetry() -> SharedTelemetry {
    Arc::new(StatsTelemetry::new())
}

pub fn create_shared_telemetry_with_persistence(path: PathBuf) -> SharedTelemetry {
    Arc::new(StatsTelemetry::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let telemetry = StatsTelemetry::new();

        telemetry.record_event();
        telemetry.record_event();
        telemetry.record_rejected();
        telemetry.record_created();
        telemetry.record_buckets_exported(1, 3);
        telemetry.record_buckets_exported(1, 2);
        telemetry.record_empty_buckets(4);
        telemetry.record_drain_failure();

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.events_processed, 2);
        assert_eq!(snapshot.events_rejected, 1);
        assert_eq!(snapshot.records_created, 1);
        assert_eq!(snapshot.buckets_exported, 2);
        assert_eq!(snapshot.lines_written, 5);
        assert_eq!(snapshot.empty_buckets_skipped, 4);
        assert_eq!(snapshot.drain_failures, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = StatsTelemetry::new().summary();
        assert!(summary.contains("Flow events processed: 0"));
        assert!(summary.contains("Failed drains: 0"));
    }

    #[test]
    fn test_persisted_counters_without_rejections_load() {
        let json = r#"{
            "events_processed": 4,
            "records_created": 1,
            "contributions_dropped": 0,
            "rotations": 2,
            "buckets_exported": 1,
            "empty_buckets_skipped": 0,
            "lines_written": 1,
            "drain_failures": 0,
            "last_updated": "2024-01-01T00:00:00Z"
        }"#;
        let persisted: PersistedTelemetry = serde_json::from_str(json).unwrap();
        assert_eq!(persisted.events_rejected, 0);
        assert_eq!(persisted.events_processed, 4);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("appid-stats-telemetry-{}", std::process::id()))
            .join("telemetry.json");
        let _ = std::fs::remove_file(&path);

        let telemetry = StatsTelemetry::with_persistence(path.clone());
        telemetry.record_event();
        telemetry.record_rotation();
        telemetry.save().unwrap();

        let reloaded = StatsTelemetry::with_persistence(path.clone());
        reloaded.record_event();
        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.events_processed, 2);
        assert_eq!(snapshot.rotations, 1);

        assert_eq!(read_persisted(&path).unwrap().events_processed, 1);
        let _ = std::fs::remove_file(path);
    }
}
