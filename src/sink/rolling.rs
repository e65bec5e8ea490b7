//! Size-bounded text log on disk.
//!
//! Lines are appended to `<dir>/<name>`. When a batch would take the file
//! past the rollover size, the file is renamed to `<name>.<export_time>` and
//! a fresh file is started. A batch is never split across files.

use super::{SinkOpener, StatsSink};
use crate::clock::Timestamp;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default file name of the statistics log.
pub const DEFAULT_LOG_FILE_NAME: &str = "appid_stats.log";

/// Write buffer size of the log file.
const WRITE_BUFFER_SIZE: usize = 4096;

/// Append-only text log that rolls over by size.
#[derive(Debug)]
pub struct RollingTextLog {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Size of the current file including buffered bytes
    size: u64,
    /// Zero disables rollover
    rollover_size: u64,
    rollovers: u64,
}

impl RollingTextLog {
    /// Opens `path` for appending, creating parent directories as needed.
    ///
    /// An existing file is kept and its size counts toward rollover.
    pub fn open(path: impl Into<PathBuf>, rollover_size: u64) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        tracing::info!(path = %path.display(), size, "opened statistics log");

        Ok(Self {
            path,
            writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, file),
            size,
            rollover_size,
            rollovers: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of times this log has rolled over since it was opened.
    pub fn rollovers(&self) -> u64 {
        self.rollovers
    }

    fn needs_roll(&self, incoming: u64) -> bool {
        self.rollover_size > 0 && self.size > 0 && self.size + incoming > self.rollover_size
    }

    fn roll(&mut self, stamp: Timestamp) -> io::Result<()> {
        self.writer.flush()?;

        let rolled = rolled_path(&self.path, stamp);
        std::fs::rename(&self.path, &rolled)?;

        let file = open_append(&self.path)?;
        self.writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        self.size = 0;
        self.rollovers += 1;

        tracing::info!(
            path = %self.path.display(),
            rolled = %rolled.display(),
            rollovers = self.rollovers,
            "rolled over statistics log"
        );
        Ok(())
    }
}

impl StatsSink for RollingTextLog {
    fn write_batch(&mut self, export_time: Timestamp, lines: &[String]) -> io::Result<()> {
        let mut rendered = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            rendered.push_str(line);
            rendered.push('\n');
        }

        let incoming = rendered.len() as u64;
        if self.needs_roll(incoming) {
            self.roll(export_time)?;
        }

        self.writer.write_all(rendered.as_bytes())?;
        self.size += incoming;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for RollingTextLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Picks `<path>.<stamp>`, adding `.N` while the name is taken.
fn rolled_path(path: &Path, stamp: i64) -> PathBuf {
    let base = format!("{}.{stamp}", path.display());
    let mut candidate = PathBuf::from(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{base}.{n}"));
        n += 1;
    }
    candidate
}

/// Opens a [`RollingTextLog`] in a directory on demand.
#[derive(Debug, Clone)]
pub struct RollingLogOpener {
    pub dir: PathBuf,
    pub file_name: String,
    pub rollover_size: u64,
}

impl RollingLogOpener {
    pub fn new(dir: impl Into<PathBuf>, rollover_size: u64) -> Self {
        Self {
            dir: dir.into(),
            file_name: DEFAULT_LOG_FILE_NAME.to_string(),
            rollover_size,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

impl SinkOpener for RollingLogOpener {
    fn open(&mut self) -> io::Result<Box<dyn StatsSink>> {
        Ok(Box::new(RollingTextLog::open(
            self.path(),
            self.rollover_size,
        )?))
    }
}
