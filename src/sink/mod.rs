//! Durable output for exported statistics.
//!
//! The exporter writes one text line per application record, one bucket
//! per batch. Sinks are opened lazily through a [`SinkOpener`] so a failed
//! open can be retried on the next drain.

pub mod rolling;

pub use rolling::{RollingLogOpener, RollingTextLog, DEFAULT_LOG_FILE_NAME};

use crate::clock::Timestamp;
use std::io;
use std::sync::{Arc, Mutex};

/// Append-only line sink.
pub trait StatsSink: Send {
    /// Appends `lines` exported at `export_time`, adding terminators.
    ///
    /// A batch is written whole or not at all.
    fn write_batch(&mut self, export_time: Timestamp, lines: &[String]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Opens a sink on first use.
pub trait SinkOpener: Send {
    fn open(&mut self) -> io::Result<Box<dyn StatsSink>>;
}

/// In-memory sink whose lines are shared with every clone.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl StatsSink for MemorySink {
    fn write_batch(&mut self, _export_time: Timestamp, batch: &[String]) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?;
        lines.extend_from_slice(batch);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SinkOpener for MemorySink {
    fn open(&mut self) -> io::Result<Box<dyn StatsSink>> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_lines() {
        let handle = MemorySink::new();
        let mut opener = handle.clone();
        let mut sink = opener.open().unwrap();

        let first = vec!["1,HTTP,10,20".to_string(), "1,SSL,1,2".to_string()];
        sink.write_batch(1, &first).unwrap();
        sink.write_batch(2, &["2,HTTP,1,1".to_string()]).unwrap();

        assert_eq!(
            handle.lines(),
            vec!["1,HTTP,10,20", "1,SSL,1,2", "2,HTTP,1,1"]
        );
    }
}
