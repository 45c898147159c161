//! Young-ancestor / old-descendant evaluation.

use std::collections::BTreeSet;

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::classify::{classify, Category, NodeState};
use crate::closure::Closure;
use crate::error::RelyResult;
use crate::graph::{RelationGraph, Walk};
use crate::time::{FileHistory, Timestamp, TimestampResolver};

/// A related file and its effective modification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Related {
    pub path: String,
    pub last_modified: Timestamp,
}

/// Full staleness picture of one node, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub path: String,
    pub category: Category,
    pub safe: bool,
    pub modified: bool,
    pub touch: Option<Timestamp>,
    pub last_modified: Timestamp,
    /// Non-safe ancestors strictly newer than this node.
    pub young_ancestors: Vec<Related>,
    /// Non-safe descendants strictly older than this node.
    pub old_descendants: Vec<Related>,
}

/// Staleness evaluator for a single command invocation.
///
/// Closures and modification times are cached for the evaluator's lifetime,
/// so build a fresh one per command.
pub struct Staleness<'g, H> {
    graph: &'g RelationGraph,
    closure: Closure,
    resolver: TimestampResolver<H>,
}

impl<'g, H: FileHistory> Staleness<'g, H> {
    pub fn new(graph: &'g RelationGraph, history: H) -> Self {
        Self {
            graph,
            closure: Closure::new(),
            resolver: TimestampResolver::new(history),
        }
    }

    /// Effective last-modified time of a node.
    pub fn last_modified(&mut self, idx: NodeIndex) -> RelyResult<Timestamp> {
        self.resolver.last_modified(self.graph.node(idx))
    }

    /// Whether a node's file has uncommitted changes.
    pub fn is_modified(&mut self, idx: NodeIndex) -> RelyResult<bool> {
        self.resolver.is_modified(self.graph.node(idx))
    }

    /// Transitive ancestors of a node, ordered by path.
    pub fn ancestors(&mut self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.closure_sorted(idx, Walk::Ancestors)
    }

    /// Transitive descendants of a node, ordered by path.
    pub fn descendants(&mut self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.closure_sorted(idx, Walk::Descendants)
    }

    /// Non-safe ancestors modified strictly after the node.
    pub fn young_ancestors(&mut self, idx: NodeIndex) -> RelyResult<Vec<NodeIndex>> {
        let own = self.last_modified(idx)?;
        let mut young = Vec::new();
        for ancestor in self.ancestors(idx) {
            if self.graph.node(ancestor).safe {
                continue;
            }
            if self.last_modified(ancestor)? > own {
                young.push(ancestor);
            }
        }
        Ok(young)
    }

    /// Non-safe descendants modified strictly before the node.
    pub fn old_descendants(&mut self, idx: NodeIndex) -> RelyResult<Vec<NodeIndex>> {
        let own = self.last_modified(idx)?;
        let mut old = Vec::new();
        for descendant in self.descendants(idx) {
            if self.graph.node(descendant).safe {
                continue;
            }
            if self.last_modified(descendant)? < own {
                old.push(descendant);
            }
        }
        Ok(old)
    }

    /// Ask the collaborator to fetch everything the given nodes' reports need.
    pub fn prefetch(&mut self, roots: &[NodeIndex]) -> RelyResult<()> {
        let mut wanted = BTreeSet::new();
        for &root in roots {
            wanted.insert(root);
            wanted.extend(self.closure.ancestors(self.graph, root).iter().copied());
            wanted.extend(self.closure.descendants(self.graph, root).iter().copied());
        }
        let paths: Vec<&str> = wanted.into_iter().map(|i| self.graph.path(i)).collect();
        self.resolver.history().prefetch(&paths)
    }

    /// Evaluate and classify a node.
    pub fn report(&mut self, idx: NodeIndex) -> RelyResult<NodeReport> {
        let graph = self.graph;
        let node = graph.node(idx);
        let modified = self.is_modified(idx)?;
        let last_modified = self.last_modified(idx)?;
        let young = self.young_ancestors(idx)?;
        let old = self.old_descendants(idx)?;

        let category = classify(&NodeState {
            node,
            modified,
            young_ancestors: young.iter().map(|&i| graph.node(i)).collect(),
        })?;

        Ok(NodeReport {
            path: node.path.clone(),
            category,
            safe: node.safe,
            modified,
            touch: node.touch,
            last_modified,
            young_ancestors: self.related(&young)?,
            old_descendants: self.related(&old)?,
        })
    }

    /// Reports for several nodes, fetched in one collaborator pass.
    pub fn reports(&mut self, indices: &[NodeIndex]) -> RelyResult<Vec<NodeReport>> {
        self.prefetch(indices)?;
        indices.iter().map(|&idx| self.report(idx)).collect()
    }

    fn related(&mut self, indices: &[NodeIndex]) -> RelyResult<Vec<Related>> {
        indices
            .iter()
            .map(|&idx| {
                Ok(Related {
                    path: self.graph.path(idx).to_string(),
                    last_modified: self.last_modified(idx)?,
                })
            })
            .collect()
    }

    fn closure_sorted(&mut self, idx: NodeIndex, walk: Walk) -> Vec<NodeIndex> {
        let graph = self.graph;
        let mut out: Vec<NodeIndex> = self.closure.of(graph, idx, walk).iter().copied().collect();
        out.sort_by(|a, b| graph.path(*a).cmp(graph.path(*b)));
        out
    }
}
