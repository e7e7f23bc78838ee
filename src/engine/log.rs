//! engine::log
//!
//! The log sink module and workspace operations report through.
//!
//! Every module-scoped failure is written as one line of the form
//! `Error: <operation> [<module>] failed: <error>`, see [`failure_line`].

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

/// Destination for user-facing log lines.
pub trait LogSink: Send + Sync {
    fn write_line(&self, message: &str);
}

/// Format a module failure line.
pub fn failure_line(operation: impl fmt::Display, module: &str, error: impl fmt::Display) -> String {
    format!("Error: {} [{}] failed: {}", operation, module, error)
}

/// Forwards lines to `tracing`.
///
/// Lines starting with `Error:` are emitted at `warn`, everything else at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_line(&self, message: &str) {
        if message.starts_with("Error:") {
            warn!(target: "lockstep", "{}", message);
        } else {
            info!(target: "lockstep", "{}", message);
        }
    }
}

/// Captures lines in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.to_string());
    }
}
