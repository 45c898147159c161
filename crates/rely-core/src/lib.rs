//! Core engine for rely: declared reliance edges between tracked files and
//! the staleness judgements derived from them.
//!
//! ## Architecture
//!
//! - [`RelationGraph`]: tracked files and their parent edges (a DAG).
//! - [`Closure`]: memoised ancestor/descendant sets.
//! - [`would_create_cycle`]: the guard every edge insertion passes through.
//! - [`TimestampResolver`]: blends commit time, filesystem time and touch
//!   overrides through a [`FileHistory`] collaborator.
//! - [`Staleness`]: young ancestors, old descendants and [`NodeReport`]s.
//! - [`classify`]: maps a node's state to a renderable [`Category`].
//!
//! ```rust
//! use rely_core::RelationGraph;
//!
//! let mut graph = RelationGraph::new();
//! graph.add_edge("a.c", "b.h").unwrap();
//! assert!(graph.add_edge("b.h", "a.c").is_err());
//! assert_eq!(graph.parents_of("a.c").unwrap(), vec!["b.h"]);
//! ```

mod classify;
mod closure;
mod cycle;
mod error;
mod graph;
mod staleness;
mod time;

pub use classify::{classify, Category, NodeState};
pub use closure::Closure;
pub use cycle::would_create_cycle;
pub use error::{RelyError, RelyResult};
pub use graph::{Node, NodeRecord, RelationGraph, Walk};
pub use petgraph::stable_graph::NodeIndex;
pub use staleness::{NodeReport, Related, Staleness};
pub use time::{from_system_time, FileHistory, Timestamp, TimestampResolver};
