//! Request DTOs for operations.
//!
//! Paths are as the user typed them; the context resolves them against the
//! working directory and validates them with git before touching the store.

use std::path::PathBuf;

use rely_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Add or remove reliance edges: every file relies on every parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRequest {
    pub files: Vec<PathBuf>,
    pub parents: Vec<PathBuf>,
}

impl EdgeRequest {
    pub fn new(files: Vec<PathBuf>, parents: Vec<PathBuf>) -> Self {
        Self { files, parents }
    }
}

/// Set or clear the touch override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchRequest {
    pub files: Vec<PathBuf>,
    /// `None` clears the override.
    pub at: Option<Timestamp>,
}

/// Report staleness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusRequest {
    /// Files to report on; empty means every tracked file.
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Only report stale files.
    #[serde(default)]
    pub problems_only: bool,

    /// Include clean files when reporting on everything.
    #[serde(default = "default_true")]
    pub include_clean: bool,
}

fn default_true() -> bool {
    true
}

impl StatusRequest {
    /// Status of every tracked file.
    pub fn all() -> Self {
        Self {
            files: vec![],
            problems_only: false,
            include_clean: true,
        }
    }

    /// Status of the given files.
    pub fn files(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            ..Self::all()
        }
    }
}
