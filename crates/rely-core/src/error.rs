//! Error types for the reliance engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type RelyResult<T> = Result<T, RelyError>;

/// Errors raised by the graph engine and its collaborators.
#[derive(Debug, Error)]
pub enum RelyError {
    /// A user-supplied path cannot be tracked (missing, not a file, not in git).
    #[error("{path}: {reason}")]
    Validation { path: String, reason: String },

    /// Adding the edge would make a file its own ancestor.
    #[error("{child} cannot rely on {parent}: that would create a cycle")]
    Cycle { child: String, parent: String },

    /// Version control gave no usable modification time for a file.
    #[error("no trustworthy modification time for {path}: {message}")]
    TimestampFormat { path: String, message: String },

    /// Engine state contradicts one of its own invariants.
    #[error("internal inconsistency: {message}")]
    InternalInconsistency { message: String },

    /// The path is not a node in the relation graph.
    #[error("{path} is not tracked by rely")]
    UnknownNode { path: String },

    /// The path is already a node in the relation graph.
    #[error("{path} is already tracked by rely")]
    NodeExists { path: String },

    /// Version control failed outside of path validation.
    #[error("version control error: {message}")]
    Vcs { message: String },

    /// I/O error (file metadata).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelyError {
    /// Create a validation error for a path.
    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a timestamp error for a path.
    pub fn timestamp(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TimestampFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown(path: &str) -> Self {
        Self::UnknownNode {
            path: path.to_string(),
        }
    }
}
