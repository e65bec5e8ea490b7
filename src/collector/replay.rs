//! Replays flow-stats events from a JSON-lines stream.
//!
//! Each non-empty line is one [`FlowStatsEvent`]. Lines starting with `#`
//! are comments. Malformed lines are logged and skipped.

use crate::collector::types::FlowStatsEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Where replayed events are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaySource {
    Stdin,
    File(PathBuf),
}

impl ReplaySource {
    /// Parses a CLI argument; `-` selects standard input.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            ReplaySource::Stdin
        } else {
            ReplaySource::File(PathBuf::from(arg))
        }
    }

    fn open(&self) -> Result<Box<dyn BufRead + Send>, CollectorError> {
        match self {
            ReplaySource::Stdin => Ok(Box::new(BufReader::new(std::io::stdin()))),
            ReplaySource::File(path) => {
                let file = File::open(path)
                    .map_err(|e| CollectorError::Io(format!("{}: {e}", path.display())))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

/// Collector that feeds events from a [`ReplaySource`] over a channel.
///
/// The channel disconnects once the source is exhausted or the collector
/// is stopped.
pub struct ReplayCollector {
    source: ReplaySource,
    sender: Option<Sender<FlowStatsEvent>>,
    receiver: Receiver<FlowStatsEvent>,
    running: Arc<AtomicBool>,
    skipped_lines: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReplayCollector {
    pub fn new(source: ReplaySource) -> Self {
        // Bounded so a fast reader cannot outrun the aggregator unboundedly
        let (sender, receiver) = bounded(10_000);

        Self {
            source,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            skipped_lines: Arc::new(AtomicU64::new(0)),
            thread_handle: None,
        }
    }

    /// Start reading the source in a background thread.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.sender.is_none() {
            return Err(CollectorError::AlreadyRunning);
        }
        let reader = self.source.open()?;
        let sender = self.sender.take().ok_or(CollectorError::AlreadyRunning)?;

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let skipped = self.skipped_lines.clone();

        let handle = thread::spawn(move || {
            run_replay_loop(reader, sender, running.clone(), skipped);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop reading. Events already queued stay in the channel.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // A reader blocked on stdin is left detached
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<FlowStatsEvent> {
        &self.receiver
    }

    /// Number of input lines that could not be parsed.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines.load(Ordering::Relaxed)
    }
}

impl Drop for ReplayCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_replay_loop(
    reader: Box<dyn BufRead + Send>,
    sender: Sender<FlowStatsEvent>,
    running: Arc<AtomicBool>,
    skipped: Arc<AtomicU64>,
) {
    for (index, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "replay input read failed");
                break;
            }
        };

        match parse_event_line(&line) {
            Ok(Some(event)) => {
                if sender.send(event).is_err() {
                    // Receiver is gone
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(line = index + 1, error = %e, "skipping malformed flow event");
            }
        }
    }
}

/// Parses one input line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_event_line(line: &str) -> Result<Option<FlowStatsEvent>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    Io(String),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CollectorError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_event_line() {
        assert!(parse_event_line("").unwrap().is_none());
        assert!(parse_event_line("   # comment").unwrap().is_none());
        assert!(parse_event_line("{not json").is_err());

        let event = parse_event_line(
            r#"{"first_packet_time":30,"initiator_bytes":5,"responder_bytes":6,"web_app_id":100}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.first_packet_time, 30);
        assert_eq!(event.web_app_id, 100);
    }

    #[test]
    fn test_source_from_arg() {
        assert_eq!(ReplaySource::from_arg("-"), ReplaySource::Stdin);
        assert_eq!(
            ReplaySource::from_arg("flows.jsonl"),
            ReplaySource::File(PathBuf::from("flows.jsonl"))
        );
    }

    #[test]
    fn test_replay_file_then_disconnect() {
        let path = std::env::temp_dir().join(format!(
            "appid-stats-replay-{}.jsonl",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "# header\n\
             {\"first_packet_time\":1,\"initiator_bytes\":1,\"responder_bytes\":2,\"service_app_id\":7}\n\
             garbage\n\
             {\"first_packet_time\":2,\"initiator_bytes\":3,\"responder_bytes\":4,\"service_app_id\":8}\n",
        )
        .unwrap();

        let mut collector = ReplayCollector::new(ReplaySource::File(path.clone()));
        collector.start().unwrap();
        assert!(matches!(collector.start(), Err(CollectorError::AlreadyRunning)));

        let receiver = collector.receiver().clone();
        let mut received = Vec::new();
        while let Ok(event) = receiver.recv_timeout(Duration::from_secs(5)) {
            received.push(event.service_app_id);
        }

        assert_eq!(received, vec![7, 8]);
        assert_eq!(collector.skipped_lines(), 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_fails_to_start() {
        let mut collector =
            ReplayCollector::new(ReplaySource::File(PathBuf::from("/nonexistent/flows.jsonl")));
        assert!(matches!(collector.start(), Err(CollectorError::Io(_))));
    }
}
