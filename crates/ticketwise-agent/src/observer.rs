//! Observability collaborator.
//!
//! The core reports technical detail here instead of returning it to the
//! caller. [`TracingObserver`] forwards to `tracing`; [`RecordingObserver`]
//! keeps records in memory so tests can assert on what was logged.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Severity of an observer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Sink for technical records.
pub trait Observer: Send + Sync {
    /// Record a message with structured context.
    fn log(&self, level: LogLevel, message: &str, context: &Value);
}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn Observer>;

/// Forwards records to `tracing` with the context as a JSON field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn log(&self, level: LogLevel, message: &str, context: &Value) {
        match level {
            LogLevel::Debug => tracing::debug!(context = %context, "{}", message),
            LogLevel::Info => tracing::info!(context = %context, "{}", message),
            LogLevel::Warn => tracing::warn!(context = %context, "{}", message),
            LogLevel::Error => tracing::error!(context = %context, "{}", message),
        }
    }
}

/// One captured record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub context: Value,
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records whose context has `key` equal to `value`.
    pub fn with_context(&self, key: &str, value: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.context.get(key).and_then(Value::as_str) == Some(value))
            .cloned()
            .collect()
    }

    /// Whether any record mentions `needle` in its message or context.
    pub fn contains(&self, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.message.contains(needle) || r.context.to_string().contains(needle))
    }
}

impl Observer for RecordingObserver {
    fn log(&self, level: LogLevel, message: &str, context: &Value) {
        self.records.lock().push(LogRecord {
            level,
            message: message.to_string(),
            context: context.clone(),
        });
    }
}
