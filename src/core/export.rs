//! Drains pending buckets to the statistics sink.

use crate::clock::Timestamp;
use crate::core::bucket::{Bucket, BucketSequence};
use crate::core::record::ApplicationRecord;
use crate::sink::{SinkOpener, StatsSink};

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Buckets whose records were written
    pub buckets_exported: u64,
    /// Buckets dropped because they had no records
    pub empty_buckets: u64,
    pub lines_written: u64,
    /// Buckets with records that were discarded after a sink failure
    pub buckets_lost: u64,
    pub sink_error: Option<String>,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.buckets_exported == 0 && self.empty_buckets == 0 && self.buckets_lost == 0
    }

    pub fn failed(&self) -> bool {
        self.sink_error.is_some()
    }
}

/// Serializes drained buckets to a lazily opened sink.
pub struct Exporter {
    opener: Box<dyn SinkOpener>,
    sink: Option<Box<dyn StatsSink>>,
}

impl Exporter {
    pub fn new(opener: Box<dyn SinkOpener>) -> Self {
        Self { opener, sink: None }
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Removes every bucket from `sequence`, earliest first, writing one
    /// line per record stamped with `export_time`.
    ///
    /// A sink failure discards the rest of the drain and releases the sink
    /// so the next drain reopens it.
    pub fn drain(&mut self, sequence: &mut BucketSequence, export_time: Timestamp) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(bucket) = sequence.pop_earliest() {
            if report.failed() {
                if !bucket.is_empty() {
                    report.buckets_lost += 1;
                }
                continue;
            }

            if bucket.is_empty() {
                report.empty_buckets += 1;
                continue;
            }

            match self.write_bucket(&bucket, export_time) {
                Ok(lines) => {
                    report.buckets_exported += 1;
                    report.lines_written += lines;
                }
                Err(e) => {
                    tracing::warn!(
                        bucket_start = bucket.start_time,
                        error = %e,
                        "statistics sink failed, discarding drain"
                    );
                    report.buckets_lost += 1;
                    report.sink_error = Some(e.to_string());
                }
            }
        }

        if !report.failed() {
            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = sink.flush() {
                    tracing::warn!(error = %e, "statistics sink flush failed");
                    self.sink = None;
                    report.sink_error = Some(e.to_string());
                }
            }
        }

        report
    }

    /// Writes one bucket as a single batch. The sink is only kept if the
    /// write succeeds.
    fn write_bucket(&mut self, bucket: &Bucket, export_time: Timestamp) -> std::io::Result<u64> {
        let lines: Vec<String> = bucket
            .records()
            .iter()
            .map(|(_, record)| format_record_line(export_time, record))
            .collect();

        let mut sink = match self.sink.take() {
            Some(sink) => sink,
            None => self.opener.open()?,
        };
        sink.write_batch(export_time, &lines)?;

        self.sink = Some(sink);
        Ok(lines.len() as u64)
    }

    /// Flushes and releases the sink.
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                tracing::warn!(error = %e, "statistics sink flush failed on close");
            }
        }
    }
}

/// Formats one exported line: `<time>,<name>,<initiator>,<responder>`.
pub fn format_record_line(export_time: Timestamp, record: &ApplicationRecord) -> String {
    format!(
        "{},{},{},{}",
        export_time, record.display_name, record.initiator_bytes, record.responder_bytes
    )
}
