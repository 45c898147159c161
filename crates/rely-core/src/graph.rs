//! In-memory relation graph.
//!
//! Nodes are tracked files; an edge `child -> parent` records that `child`
//! relies on `parent`. Parents are the outgoing neighbours of a node and
//! children the incoming ones, so both directions are an adjacency lookup.

use std::collections::HashMap;

use petgraph::graph::DiGraph;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::closure::Closure;
use crate::cycle::would_create_cycle;
use crate::error::{RelyError, RelyResult};
use crate::time::Timestamp;

/// A tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Canonical repository-relative path, `/`-separated.
    pub path: String,
    /// Excluded from staleness reports about other files.
    pub safe: bool,
    /// Manual "at least this fresh" override.
    pub touch: Option<Timestamp>,
}

impl Node {
    /// Create an unflagged node.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            safe: false,
            touch: None,
        }
    }
}

/// Flat, persistable form of a node and its declared parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub path: String,
    pub safe: bool,
    pub touch: Option<Timestamp>,
    /// Parent paths, sorted.
    pub parents: Vec<String>,
}

/// Which way to walk the relation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Walk {
    /// Follow parent edges (things a file relies on).
    Ancestors,
    /// Follow child edges (things that rely on a file).
    Descendants,
}

impl Walk {
    pub(crate) fn direction(self) -> Direction {
        match self {
            Walk::Ancestors => Direction::Outgoing,
            Walk::Descendants => Direction::Incoming,
        }
    }
}

/// The set of tracked files and their reliance edges.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    graph: StableDiGraph<Node, ()>,
    index: HashMap<String, NodeIndex>,
}

impl RelationGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no file is tracked.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of reliance edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether `path` is tracked.
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Index of the node for `path`, if tracked.
    pub fn index_of(&self, path: &str) -> Option<NodeIndex> {
        self.index.get(path).copied()
    }

    /// Index of the node for `path`, or `UnknownNode`.
    pub fn require(&self, path: &str) -> RelyResult<NodeIndex> {
        self.index_of(path).ok_or_else(|| RelyError::unknown(path))
    }

    /// Node stored at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` does not belong to this graph.
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    /// Path of the node stored at `idx`.
    pub fn path(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].path
    }

    /// All node indices, ordered by path.
    pub fn indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.index.values().copied().collect();
        self.sort_by_path(&mut indices);
        indices
    }

    /// Get or create the node for `path`.
    pub fn ensure_node(&mut self, path: &str) -> NodeIndex {
        if let Some(idx) = self.index_of(path) {
            return idx;
        }
        let idx = self.graph.add_node(Node::new(path));
        self.index.insert(path.to_string(), idx);
        debug!(path, "Created node");
        idx
    }

    /// Direct parents of `idx`, ordered by path.
    pub fn parents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Walk::Ancestors)
    }

    /// Direct children of `idx`, ordered by path.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Walk::Descendants)
    }

    /// Direct neighbours of `idx` in the given direction, ordered by path.
    pub fn neighbors(&self, idx: NodeIndex, walk: Walk) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, walk.direction())
            .collect();
        self.sort_by_path(&mut out);
        out
    }

    /// Paths `path` directly relies on.
    pub fn parents_of(&self, path: &str) -> RelyResult<Vec<&str>> {
        let idx = self.require(path)?;
        Ok(self.parents(idx).into_iter().map(|p| self.path(p)).collect())
    }

    /// Paths that directly rely on `path`.
    pub fn children_of(&self, path: &str) -> RelyResult<Vec<&str>> {
        let idx = self.require(path)?;
        Ok(self.children(idx).into_iter().map(|c| self.path(c)).collect())
    }

    /// Declare that `child` relies on `parent`.
    ///
    /// Missing nodes are created. Returns `Ok(false)` when the edge already
    /// existed. On a cycle nothing is changed, not even node creation.
    pub fn add_edge(&mut self, child: &str, parent: &str) -> RelyResult<bool> {
        if let (Some(c), Some(p)) = (self.index_of(child), self.index_of(parent)) {
            if would_create_cycle(self, c, p) {
                return Err(RelyError::Cycle {
                    child: child.to_string(),
                    parent: parent.to_string(),
                });
            }
            if self.graph.find_edge(c, p).is_some() {
                return Ok(false);
            }
            self.graph.add_edge(c, p, ());
            return Ok(true);
        }

        if child == parent {
            return Err(RelyError::Cycle {
                child: child.to_string(),
                parent: parent.to_string(),
            });
        }
        // A freshly created endpoint has no edges, so no cycle is possible.
        let c = self.ensure_node(child);
        let p = self.ensure_node(parent);
        self.graph.add_edge(c, p, ());
        Ok(true)
    }

    /// Declare that every file in `children` relies on every file in `parents`.
    ///
    /// All or nothing: if any pair would close a cycle (counting pairs added
    /// earlier in the same batch) the graph is left untouched. Returns the
    /// number of edges that were new.
    pub fn add_edges<C, P>(&mut self, children: &[C], parents: &[P]) -> RelyResult<usize>
    where
        C: AsRef<str>,
        P: AsRef<str>,
    {
        let snapshot = self.clone();
        let mut added = 0;
        for child in children {
            for parent in parents {
                match self.add_edge(child.as_ref(), parent.as_ref()) {
                    Ok(true) => added += 1,
                    Ok(false) => {}
                    Err(err) => {
                        *self = snapshot;
                        return Err(err);
                    }
                }
            }
        }
        Ok(added)
    }

    /// Drop the declaration that `child` relies on `parent`.
    ///
    /// Returns whether an edge was removed.
    pub fn remove_edge(&mut self, child: &str, parent: &str) -> bool {
        let (Some(c), Some(p)) = (self.index_of(child), self.index_of(parent)) else {
            return false;
        };
        match self.graph.find_edge(c, p) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                true
            }
            None => false,
        }
    }

    /// Set the safe flag, creating the node if needed. Returns the old value.
    pub fn set_safe(&mut self, path: &str, safe: bool) -> bool {
        let idx = self.ensure_node(path);
        std::mem::replace(&mut self.graph[idx].safe, safe)
    }

    /// Set or clear the touch override, creating the node if needed.
    pub fn set_touch(&mut self, path: &str, touch: Option<Timestamp>) -> Option<Timestamp> {
        let idx = self.ensure_node(path);
        std::mem::replace(&mut self.graph[idx].touch, touch)
    }

    /// Move a node to a new path, keeping its edges and flags.
    pub fn rename(&mut self, old: &str, new: &str) -> RelyResult<()> {
        let idx = self.require(old)?;
        if self.contains(new) {
            return Err(RelyError::NodeExists {
                path: new.to_string(),
            });
        }
        self.index.remove(old);
        self.index.insert(new.to_string(), idx);
        self.graph[idx].path = new.to_string();
        Ok(())
    }

    /// Remove nodes that carry no information: no edges in either direction,
    /// not safe, no touch override. Returns the removed paths, sorted.
    pub fn prune(&mut self) -> Vec<String> {
        let idle: Vec<NodeIndex> = self
            .indices()
            .into_iter()
            .filter(|&idx| {
                let node = &self.graph[idx];
                !node.safe
                    && node.touch.is_none()
                    && self
                        .graph
                        .neighbors_directed(idx, Direction::Outgoing)
                        .next()
                        .is_none()
                    && self
                        .graph
                        .neighbors_directed(idx, Direction::Incoming)
                        .next()
                        .is_none()
            })
            .collect();

        let mut removed = Vec::with_capacity(idle.len());
        for idx in idle {
            if let Some(node) = self.graph.remove_node(idx) {
                self.index.remove(&node.path);
                removed.push(node.path);
            }
        }
        removed
    }

    /// The node at `root` plus its closure in one direction, as a standalone
    /// graph whose edges point from child to parent.
    pub fn subgraph(&self, root: NodeIndex, walk: Walk) -> DiGraph<String, ()> {
        let mut closure = Closure::new();
        let mut members = vec![root];
        members.extend(closure.of(self, root, walk).iter().copied());
        self.sort_by_path(&mut members[1..]);

        let mut out = DiGraph::new();
        let mut mapped = HashMap::new();
        for &idx in &members {
            mapped.insert(idx, out.add_node(self.path(idx).to_string()));
        }
        for &idx in &members {
            for parent in self.parents(idx) {
                if let Some(&to) = mapped.get(&parent) {
                    out.add_edge(mapped[&idx], to, ());
                }
            }
        }
        out
    }

    /// Persistable records for every node, ordered by path.
    pub fn records(&self) -> Vec<NodeRecord> {
        self.indices()
            .into_iter()
            .map(|idx| {
                let node = &self.graph[idx];
                NodeRecord {
                    path: node.path.clone(),
                    safe: node.safe,
                    touch: node.touch,
                    parents: self
                        .parents(idx)
                        .into_iter()
                        .map(|p| self.path(p).to_string())
                        .collect(),
                }
            })
            .collect()
    }

    pub(crate) fn inner(&self) -> &StableDiGraph<Node, ()> {
        &self.graph
    }

    fn sort_by_path(&self, indices: &mut [NodeIndex]) {
        indices.sort_by(|a, b| self.graph[*a].path.cmp(&self.graph[*b].path));
    }
}
