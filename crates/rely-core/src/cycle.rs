//! Cycle guard for edge insertion.

use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::NodeIndex;

use crate::graph::RelationGraph;

/// Whether declaring `child -> parent` would make `child` its own ancestor.
///
/// True iff `child` is `parent` or `child` is already an ancestor of `parent`.
pub fn would_create_cycle(graph: &RelationGraph, child: NodeIndex, parent: NodeIndex) -> bool {
    child == parent || has_path_connecting(graph.inner(), parent, child, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_direct_and_transitive_back_edges() {
        let mut graph = RelationGraph::new();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "c").unwrap();
        let a = graph.require("a").unwrap();
        let b = graph.require("b").unwrap();
        let c = graph.require("c").unwrap();

        assert!(would_create_cycle(&graph, b, a));
        assert!(would_create_cycle(&graph, c, a));
        assert!(would_create_cycle(&graph, a, a));
        assert!(!would_create_cycle(&graph, a, c));
    }

    #[test]
    fn test_siblings_do_not_conflict() {
        let mut graph = RelationGraph::new();
        graph.add_edges(&["x", "y"], &["base"]).unwrap();
        let x = graph.require("x").unwrap();
        let y = graph.require("y").unwrap();
        assert!(!would_create_cycle(&graph, x, y));
        assert!(!would_create_cycle(&graph, y, x));
    }
}
