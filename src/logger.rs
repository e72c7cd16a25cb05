//! Structured JSONL logging for Crowsnest.
//!
//! One JSON object per line, appended to a file named by the current date
//! (`YYYY-MM-DD.log`) inside the logs subdirectory of the cache dir.
//! Logging never fails outward: a write error is reported on stderr once
//! and otherwise swallowed so a full disk cannot take down the poll loop.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A single log record.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 timestamp when the record was written
    pub timestamp: String,
    /// Record severity
    pub level: LogLevel,
    /// Human-readable message
    pub message: String,
    /// Optional structured payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Appends JSONL records to date-named files.
#[derive(Debug, Clone)]
pub struct Logger {
    log_dir: PathBuf,
}

impl Logger {
    /// Create a logger writing into `log_dir`. The directory is created
    /// lazily on first write.
    pub fn new(log_dir: &Path) -> Self {
        Self {
            log_dir: log_dir.to_path_buf(),
        }
    }

    fn log_file(&self) -> PathBuf {
        let date = Utc::now().format("%Y-%m-%d");
        self.log_dir.join(format!("{}.log", date))
    }

    /// Append one record. Errors are reported on stderr, never returned.
    pub fn log(&self, level: LogLevel, message: &str, data: Option<serde_json::Value>) {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level,
            message: message.to_string(),
            data,
        };

        if let Err(e) = self.append(&entry) {
            eprintln!("Warning: failed to write log entry: {}", e);
        }
    }

    fn append(&self, entry: &LogEntry) -> std::io::Result<()> {
        fs::create_dir_all(&self.log_dir)?;
        let json = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file())?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    pub fn info(&self, message: &str, data: Option<serde_json::Value>) {
        self.log(LogLevel::Info, message, data);
    }

    pub fn warn(&self, message: &str, data: Option<serde_json::Value>) {
        self.log(LogLevel::Warn, message, data);
    }

    pub fn error(&self, message: &str, data: Option<serde_json::Value>) {
        self.log(LogLevel::Error, message, data);
    }
}
