//! Error types for context-assembler

use thiserror::Error;

/// Result type for context operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors that can occur during discovery and assembly.
///
/// Only configuration-level problems surface here. Per-file and per-directory
/// failures are logged and skipped by the walker and budgeter.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid root directory '{path}': {reason}")]
    InvalidRoot { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ContextError {
    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        // Keep oversized patterns readable in the message
        let shown = if pattern.chars().count() > 60 {
            let head: String = pattern.chars().take(60).collect();
            format!("{}...", head)
        } else {
            pattern.to_string()
        };
        Self::InvalidPattern {
            pattern: shown,
            reason: reason.into(),
        }
    }
}
