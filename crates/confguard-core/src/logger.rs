//! Per-evaluation diagnostic log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Level of an evaluation log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Fine-grained tracing.
    Trace,
    /// Debugging detail.
    Debug,
    /// Normal information.
    Info,
    /// Something looks wrong.
    Warn,
    /// Evaluation failed.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "TRACE"),
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One line of an evaluation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
}

/// Leveled buffer handed to a rule check.
///
/// Clones share the same buffer. Every entry is also emitted through
/// `tracing` at the matching level.
#[derive(Debug, Clone, Default)]
pub struct EvaluationLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl EvaluationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Appends an entry.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Trace => tracing::trace!(target: "confguard::evaluation", "{message}"),
            LogLevel::Debug => tracing::debug!(target: "confguard::evaluation", "{message}"),
            LogLevel::Info => tracing::info!(target: "confguard::evaluation", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "confguard::evaluation", "{message}"),
            LogLevel::Error => tracing::error!(target: "confguard::evaluation", "{message}"),
        }
        self.lock().push(LogEntry { level, message });
    }

    /// Appends a trace entry.
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    /// Appends a debug entry.
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    /// Appends an info entry.
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Appends a warning entry.
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    /// Appends an error entry.
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Whether any entry has at least the given level.
    #[must_use]
    pub fn has_level(&self, level: LogLevel) -> bool {
        self.lock().iter().any(|e| e.level >= level)
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Renders the log as `[LEVEL] message` lines.
    #[must_use]
    pub fn render(&self) -> String {
        self.lock()
            .iter()
            .map(|e| format!("[{}] {}", e.level, e.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let log = EvaluationLog::new();
        let other = log.clone();
        other.info("from clone");
        log.debug("from original");
        assert_eq!(log.entries().len(), 2);
        assert_eq!(other.render(), "[INFO] from clone\n[DEBUG] from original");
    }

    #[test]
    fn has_level_compares_severity() {
        let log = EvaluationLog::new();
        assert!(log.is_empty());
        log.warn("careful");
        assert!(log.has_level(LogLevel::Info));
        assert!(log.has_level(LogLevel::Warn));
        assert!(!log.has_level(LogLevel::Error));
    }
}
