//! Status holder used by pre-checks to report friendly messages.

use serde::{Deserialize, Serialize};

/// Severity of a status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    /// Informational.
    Info,
    /// Something the caller should know about.
    Warning,
    /// The operation cannot proceed.
    Error,
}

/// One recorded status message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Severity.
    pub level: StatusLevel,
    /// Human-readable message.
    pub message: String,
}

/// Collects messages produced by a pre-check so UI/API layers can show them
/// instead of relying on the error path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusHolder {
    entries: Vec<StatusEntry>,
}

impl StatusHolder {
    /// Empty holder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an info message.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(StatusLevel::Info, message);
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(StatusLevel::Warning, message);
    }

    /// Record an error.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(StatusLevel::Error, message);
    }

    fn push(&mut self, level: StatusLevel, message: impl Into<String>) {
        self.entries.push(StatusEntry {
            level,
            message: message.into(),
        });
    }

    /// Whether any error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.level == StatusLevel::Error)
    }

    /// Most recent error message.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.level == StatusLevel::Error)
            .map(|e| e.message.as_str())
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }
}
