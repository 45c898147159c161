//! Status categories consumed by renderers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RelyError, RelyResult};
use crate::graph::Node;

/// Display category of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Flagged safe, no local edits.
    SafeClean,
    /// Flagged safe, local edits present.
    SafeModified,
    /// Something it relies on changed after it did.
    Stale,
    /// Up to date, local edits present.
    Modified,
    /// Up to date, no local edits.
    Clean,
}

impl Category {
    /// Get a display label for the category.
    pub fn label(&self) -> &'static str {
        match self {
            Category::SafeClean => "safe",
            Category::SafeModified => "safe, modified",
            Category::Stale => "stale",
            Category::Modified => "modified",
            Category::Clean => "clean",
        }
    }

    /// Whether this category signals a staleness problem.
    pub fn is_problem(&self) -> bool {
        matches!(self, Category::Stale)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the classifier looks at for one node.
#[derive(Debug, Clone)]
pub struct NodeState<'a> {
    pub node: &'a Node,
    pub modified: bool,
    pub young_ancestors: Vec<&'a Node>,
}

/// Map a node's state to its category.
///
/// The young-ancestor list must never name the node itself or a safe node;
/// if it does the evaluator is broken and the result cannot be trusted.
pub fn classify(state: &NodeState<'_>) -> RelyResult<Category> {
    if let Some(bad) = state
        .young_ancestors
        .iter()
        .find(|a| a.safe || a.path == state.node.path)
    {
        return Err(RelyError::InternalInconsistency {
            message: format!(
                "{} reported as a young ancestor of {}",
                bad.path, state.node.path
            ),
        });
    }

    let stale = !state.young_ancestors.is_empty();
    let category = match (state.node.safe, state.modified, stale) {
        (true, false, _) => Category::SafeClean,
        (true, true, _) => Category::SafeModified,
        (false, _, true) => Category::Stale,
        (false, true, false) => Category::Modified,
        (false, false, false) => Category::Clean,
    };
    Ok(category)
}
