//! Response DTOs for operations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use petgraph::graph::DiGraph;
use rely_core::{Category, NodeReport, Walk};
use serde::Serialize;

/// Response from `init`.
#[derive(Debug, Clone, Serialize)]
pub struct InitResponse {
    pub store: PathBuf,
}

/// Response from edge additions or removals.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeResponse {
    /// Canonical paths of the dependent files.
    pub files: Vec<String>,
    /// Canonical paths of the parents.
    pub parents: Vec<String>,
    /// Edges that actually changed.
    pub changed: usize,
}

/// Response from flag updates (`safe`, `unsafe`, `touch`, `untouch`).
#[derive(Debug, Clone, Serialize)]
pub struct FlagResponse {
    /// Files whose flag actually changed.
    pub changed: Vec<String>,
    /// Files that already had the requested value.
    pub unchanged: Vec<String>,
}

/// Response from `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub reports: Vec<NodeReport>,
}

impl StatusResponse {
    /// Whether any reported file is stale.
    pub fn has_problems(&self) -> bool {
        self.reports.iter().any(|r| r.category.is_problem())
    }

    /// Count of reports per category.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for report in &self.reports {
            *counts.entry(report.category.label().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Response from `parents` / `children`.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborsResponse {
    pub path: String,
    pub walk: Walk,
    pub neighbors: Vec<String>,
}

/// Response from `ancestors` / `descendants`.
#[derive(Debug, Clone, Serialize)]
pub struct ClosureResponse {
    pub root: String,
    pub walk: Walk,
    /// Direct neighbours (in walk direction) of every member, members sorted.
    pub adjacency: BTreeMap<String, Vec<String>>,
    /// Category of every member.
    pub categories: BTreeMap<String, Category>,
    /// Root plus closure, edges pointing from child to parent.
    #[serde(skip)]
    pub graph: DiGraph<String, ()>,
}

/// Response from `mv`.
#[derive(Debug, Clone, Serialize)]
pub struct MoveResponse {
    pub from: String,
    pub to: String,
}

/// Response from `prune`.
#[derive(Debug, Clone, Serialize)]
pub struct PruneResponse {
    pub removed: Vec<String>,
    pub remaining: usize,
}
