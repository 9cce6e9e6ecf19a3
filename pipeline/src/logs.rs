//! Run log shared by every pipeline stage.
//!
//! Entries are printed to the console and, once [`RunLog::attach_file`] has
//! been called, appended to a timestamped file such as
//! `logs/log_2024_01_15_09_30.log`.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use once_cell::sync::Lazy;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// A single log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth for console output
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Success,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warning,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// `2024-01-15 09:30:00 | WARNING  | message`
    fn file_line(&self) -> String {
        format!(
            "{} | {:<8} | {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.level.label(),
            self.message
        )
    }
}

/// Global run log
pub static RUN_LOG: Lazy<RunLog> = Lazy::new(RunLog::new);

/// Writes log entries to the console and an optional log file
pub struct RunLog {
    file: Mutex<Option<File>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self { file: Mutex::new(None) }
    }

    /// Start mirroring entries into a new timestamped file under `folder`.
    ///
    /// Creates the folder if needed and returns the file path.
    pub fn attach_file(&self, folder: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(folder)?;
        let path = folder.join(log_file_name());
        let file = File::create(&path)?;

        if let Ok(mut slot) = self.file.lock() {
            *slot = Some(file);
        }
        Ok(path)
    }

    /// Record an entry
    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(entry.indent as usize);
        match entry.level {
            LogLevel::Warning | LogLevel::Error => {
                eprintln!("{}{} {}", indent, prefix, entry.message)
            }
            _ => println!("{}{} {}", indent, prefix, entry.message),
        }

        // A failing log file must never take the run down with it
        if let Ok(mut slot) = self.file.lock() {
            if let Some(file) = slot.as_mut() {
                let _ = writeln!(file, "{}", entry.file_line());
            }
        }
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// `log_YYYY_MM_DD_HH_MM.log`, local time
fn log_file_name() -> String {
    format!("log_{}.log", Local::now().format("%Y_%m_%d_%H_%M"))
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    RUN_LOG.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_line_layout() {
        let line = LogEntry::warning("clear skipped").file_line();
        let parts: Vec<&str> = line.split(" | ").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], "WARNING ");
        assert_eq!(parts[2], "clear skipped");
    }

    #[test]
    fn test_log_file_name() {
        let name = log_file_name();
        assert!(name.starts_with("log_"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "log_2024_01_15_09_30.log".len());
    }

    #[test]
    fn test_attach_file_mirrors_entries() {
        let dir = tempdir().unwrap();
        let log = RunLog::new();
        let path = log.attach_file(&dir.path().join("logs")).unwrap();

        log.log(LogEntry::info("pipeline started"));
        log.log(LogEntry::error("upload failed").with_indent(1));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("| INFO     | pipeline started"));
        assert!(content.contains("| ERROR    | upload failed"));
    }
}
