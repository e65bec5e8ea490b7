//! The per-application statistics aggregator.
//!
//! One instance belongs to one execution context. `update` folds a
//! flow-stats event into the bucket for its first-packet time, `flush`
//! rotates idle windows on schedule, and `shutdown` exports whatever is
//! still buffered. Export happens synchronously when a window boundary is
//! crossed. No failure inside the aggregator is propagated to the caller;
//! failures are logged and counted in telemetry.

use crate::clock::{Clock, Timestamp};
use crate::collector::types::FlowStatsEvent;
use crate::config::Config;
use crate::core::export::{DrainReport, Exporter};
use crate::core::rotation::{RotationController, RotationState};
use crate::registry::AppRegistry;
use crate::sink::SinkOpener;
use crate::telemetry::{create_shared_telemetry, SharedTelemetry};
use std::sync::Arc;

pub struct AppIdStatistics {
    rotation: RotationController,
    exporter: Exporter,
    registry: Arc<dyn AppRegistry>,
    clock: Box<dyn Clock>,
    telemetry: SharedTelemetry,
    shut_down: bool,
}

impl AppIdStatistics {
    /// Create an aggregator whose first window is opened at the clock's
    /// current time. The `enabled` flag is not consulted; see
    /// [`AppIdStatistics::initialize`].
    pub fn new(
        config: &Config,
        clock: Box<dyn Clock>,
        registry: Arc<dyn AppRegistry>,
        opener: Box<dyn SinkOpener>,
    ) -> Self {
        let now = clock.now();
        Self {
            rotation: RotationController::new(
                config.window_secs(),
                now,
                config.max_records_per_bucket,
            ),
            exporter: Exporter::new(opener),
            registry,
            clock,
            telemetry: create_shared_telemetry(),
            shut_down: false,
        }
    }

    /// Creates the aggregator only if statistics are enabled.
    pub fn initialize(
        config: &Config,
        clock: Box<dyn Clock>,
        registry: Arc<dyn AppRegistry>,
        opener: Box<dyn SinkOpener>,
    ) -> Option<Self> {
        if !config.enabled {
            tracing::info!("application statistics disabled");
            return None;
        }
        Some(Self::new(config, clock, registry, opener))
    }

    /// Report counters into `telemetry` instead of a private instance.
    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn telemetry(&self) -> &SharedTelemetry {
        &self.telemetry
    }

    pub fn window_end(&self) -> Timestamp {
        self.rotation.window_end()
    }

    pub fn rotation_state(&self) -> RotationState {
        self.rotation.state()
    }

    /// Buckets currently receiving updates.
    pub fn active_bucket_count(&self) -> usize {
        self.rotation.active().len()
    }

    /// Folds one flow-stats event into the active window.
    ///
    /// If the current window has expired it is exported first. An event
    /// whose bucket start cannot be represented is dropped.
    pub fn update(&mut self, event: &FlowStatsEvent) {
        let now = self.clock.now();
        self.rotate_if_due(now);

        let Some(start) = self.rotation.bucket_start(event.first_packet_time) else {
            tracing::warn!(
                first_packet_time = event.first_packet_time,
                "flow-stats event outside the representable time range, dropping"
            );
            self.telemetry.record_rejected();
            return;
        };

        let bucket = self.rotation.active_mut().locate_or_create(start);
        bucket.add_totals(event.initiator_bytes, event.responder_bytes);

        for app_id in event.credited_app_ids() {
            match bucket.accumulate(
                app_id,
                self.registry.as_ref(),
                event.initiator_bytes,
                event.responder_bytes,
            ) {
                Ok(true) => self.telemetry.record_created(),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(app_id, bucket_start = start, "{e}");
                    self.telemetry.record_dropped();
                }
            }
        }

        self.telemetry.record_event();
    }

    /// Rotates and exports if the window boundary has passed, without an
    /// event. Returns `None` when no rotation was due.
    pub fn flush(&mut self) -> Option<DrainReport> {
        let now = self.clock.now();
        self.rotate_if_due(now)
    }

    /// Forces a final rotation and export.
    pub fn shutdown(mut self) -> DrainReport {
        self.finish()
    }

    fn rotate_if_due(&mut self, now: Timestamp) -> Option<DrainReport> {
        if !self.rotation.rotate_if_due(now) {
            return None;
        }
        self.telemetry.record_rotation();
        Some(self.drain(now))
    }

    fn drain(&mut self, now: Timestamp) -> DrainReport {
        let report = self.exporter.drain(self.rotation.pending_mut(), now);

        self.telemetry.record_empty_buckets(report.empty_buckets);
        self.telemetry
            .record_buckets_exported(report.buckets_exported, report.lines_written);
        if let Some(error) = &report.sink_error {
            tracing::warn!(
                buckets_lost = report.buckets_lost,
                error = %error,
                "application statistics lost for this window"
            );
            self.telemetry.record_drain_failure();
        }

        report
    }

    fn finish(&mut self) -> DrainReport {
        if self.shut_down {
            return DrainReport::default();
        }
        self.shut_down = true;

        let now = self.clock.now();
        self.rotation.rotate(now);
        self.telemetry.record_rotation();
        let report = self.drain(now);
        self.exporter.close();

        tracing::info!(
            buckets_exported = report.buckets_exported,
            lines_written = report.lines_written,
            "application statistics shut down"
        );
        report
    }
}

impl Drop for AppIdStatistics {
    fn drop(&mut self) {
        self.finish();
    }
}
