//! Transitive ancestor and descendant sets.

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::NodeIndex;

use crate::graph::{RelationGraph, Walk};

/// Memoised closure tables for one command invocation.
///
/// Every set computed on the way to an answer is kept, so later queries that
/// reach an already visited subtree reuse it. The tables must not outlive
/// the graph state they were computed from.
#[derive(Debug, Default)]
pub struct Closure {
    ancestors: HashMap<NodeIndex, HashSet<NodeIndex>>,
    descendants: HashMap<NodeIndex, HashSet<NodeIndex>>,
}

impl Closure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything `idx` transitively relies on.
    pub fn ancestors(&mut self, graph: &RelationGraph, idx: NodeIndex) -> &HashSet<NodeIndex> {
        self.of(graph, idx, Walk::Ancestors)
    }

    /// Everything that transitively relies on `idx`.
    pub fn descendants(&mut self, graph: &RelationGraph, idx: NodeIndex) -> &HashSet<NodeIndex> {
        self.of(graph, idx, Walk::Descendants)
    }

    /// Closure of `idx` in the given direction, excluding `idx` itself.
    pub fn of(&mut self, graph: &RelationGraph, idx: NodeIndex, walk: Walk) -> &HashSet<NodeIndex> {
        let memo = match walk {
            Walk::Ancestors => &mut self.ancestors,
            Walk::Descendants => &mut self.descendants,
        };
        fill(graph, memo, idx, walk);
        &memo[&idx]
    }

    /// Drop all memoised sets.
    pub fn clear(&mut self) {
        self.ancestors.clear();
        self.descendants.clear();
    }
}

/// Post-order DFS with an explicit stack: a node's set is the union of its
/// neighbours and their (already computed) sets.
fn fill(
    graph: &RelationGraph,
    memo: &mut HashMap<NodeIndex, HashSet<NodeIndex>>,
    start: NodeIndex,
    walk: Walk,
) {
    if memo.contains_key(&start) {
        return;
    }

    let mut expanded = HashSet::new();
    let mut stack = vec![(start, false)];
    while let Some((idx, ready)) = stack.pop() {
        if memo.contains_key(&idx) {
            continue;
        }
        let next = graph.neighbors(idx, walk);
        if ready {
            let mut set = HashSet::new();
            for n in next {
                set.insert(n);
                if let Some(sub) = memo.get(&n) {
                    set.extend(sub.iter().copied());
                }
            }
            memo.insert(idx, set);
        } else if expanded.insert(idx) {
            stack.push((idx, true));
            stack.extend(
                next.into_iter()
                    .filter(|n| !memo.contains_key(n) && !expanded.contains(n))
                    .map(|n| (n, false)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(graph: &RelationGraph, set: &HashSet<NodeIndex>) -> Vec<String> {
        let mut out: Vec<String> = set.iter().map(|&i| graph.path(i).to_string()).collect();
        out.sort();
        out
    }

    fn diamond() -> RelationGraph {
        // app relies on left and right, both rely on base.
        let mut graph = RelationGraph::new();
        graph.add_edges(&["app"], &["left", "right"]).unwrap();
        graph.add_edges(&["left", "right"], &["base"]).unwrap();
        graph
    }

    #[test]
    fn test_ancestors_are_transitive_and_deduplicated() {
        let graph = diamond();
        let mut closure = Closure::new();
        let app = graph.require("app").unwrap();
        let set = closure.ancestors(&graph, app).clone();
        assert_eq!(names(&graph, &set), vec!["base", "left", "right"]);
    }

    #[test]
    fn test_descendants_follow_children() {
        let graph = diamond();
        let mut closure = Closure::new();
        let base = graph.require("base").unwrap();
        let set = closure.descendants(&graph, base).clone();
        assert_eq!(names(&graph, &set), vec!["app", "left", "right"]);
    }

    #[test]
    fn test_roots_and_leaves_have_empty_closures() {
        let graph = diamond();
        let mut closure = Closure::new();
        let base = graph.require("base").unwrap();
        let app = graph.require("app").unwrap();
        assert!(closure.ancestors(&graph, base).is_empty());
        assert!(closure.descendants(&graph, app).is_empty());
    }

    #[test]
    fn test_memoised_subtrees_are_reused() {
        let graph = diamond();
        let mut closure = Closure::new();
        let left = graph.require("left").unwrap();
        let app = graph.require("app").unwrap();

        assert_eq!(closure.ancestors(&graph, left).len(), 1);
        assert_eq!(closure.ancestors(&graph, app).len(), 3);
        // The app query filled in the tables for every node it walked through.
        assert_eq!(closure.ancestors.len(), 4);
    }

    #[test]
    fn test_removing_edge_drops_unreachable_ancestor() {
        let mut graph = RelationGraph::new();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "c").unwrap();
        graph.add_edge("a", "d").unwrap();
        let a = graph.require("a").unwrap();

        let mut closure = Closure::new();
        assert!(closure.ancestors(&graph, a).contains(&graph.require("c").unwrap()));

        graph.remove_edge("a", "b");
        closure.clear();
        assert_eq!(names(&graph, closure.ancestors(&graph, a)), vec!["d"]);

        graph.add_edge("d", "c").unwrap();
        closure.clear();
        assert_eq!(names(&graph, closure.ancestors(&graph, a)), vec!["c", "d"]);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let mut graph = RelationGraph::new();
        for i in 0..2_000 {
            graph
                .add_edge(&format!("f{i}"), &format!("f{}", i + 1))
                .unwrap();
        }
        let mut closure = Closure::new();
        let head = graph.require("f0").unwrap();
        assert_eq!(closure.ancestors(&graph, head).len(), 2_000);
    }
}
