//! Error types for the operations layer.

use std::path::PathBuf;

use rely_core::RelyError;
use thiserror::Error;

/// Result type for operations.
pub type OpsResult<T> = Result<T, OpsError>;

/// Errors that can occur during operations.
#[derive(Debug, Error)]
pub enum OpsError {
    /// No relations store exists yet.
    #[error("no relations store at {path}; run `rely init` to create one")]
    MissingStore { path: PathBuf },

    /// `init` found an existing store.
    #[error("a relations store already exists at {path}")]
    StoreExists { path: PathBuf },

    /// The store file could not be parsed.
    #[error("corrupt relations store {path}, line {line}: {message}")]
    CorruptStore {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A path cannot be written to the tab-separated store.
    #[error("cannot store path {path:?}: tabs and newlines are not allowed")]
    UnstorablePath { path: String },

    /// Engine or version-control failure.
    #[error(transparent)]
    Core(#[from] RelyError),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OpsError {
    /// Whether this only says that nothing has been tracked yet.
    pub fn is_missing_store(&self) -> bool {
        matches!(self, OpsError::MissingStore { .. })
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
