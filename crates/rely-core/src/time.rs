//! Modification-time resolution.
//!
//! Three sources compete for a file's "last modified" instant:
//! - the filesystem mtime, when the file has uncommitted changes,
//! - the time of the newest commit touching it, otherwise,
//! - a manual touch override, which may only move the result later.

use std::collections::HashMap;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::RelyResult;
use crate::graph::Node;

/// Instant used for every staleness comparison.
pub type Timestamp = DateTime<Utc>;

/// Convert a filesystem time to a [`Timestamp`].
pub fn from_system_time(time: SystemTime) -> Timestamp {
    DateTime::<Utc>::from(time)
}

/// Version-control facts the resolver needs about a file.
pub trait FileHistory {
    /// Whether the file has uncommitted changes (working tree or index).
    fn is_modified(&self, path: &str) -> RelyResult<bool>;

    /// Last write time of the file on disk.
    fn filesystem_time(&self, path: &str) -> RelyResult<Timestamp>;

    /// Time of the newest commit that touched the file.
    fn history_time(&self, path: &str) -> RelyResult<Timestamp>;

    /// Hint that the given paths are about to be queried, so an
    /// implementation can fetch them in one pass.
    fn prefetch(&self, _paths: &[&str]) -> RelyResult<()> {
        Ok(())
    }
}

impl<T: FileHistory + ?Sized> FileHistory for &T {
    fn is_modified(&self, path: &str) -> RelyResult<bool> {
        (**self).is_modified(path)
    }

    fn filesystem_time(&self, path: &str) -> RelyResult<Timestamp> {
        (**self).filesystem_time(path)
    }

    fn history_time(&self, path: &str) -> RelyResult<Timestamp> {
        (**self).history_time(path)
    }

    fn prefetch(&self, paths: &[&str]) -> RelyResult<()> {
        (**self).prefetch(paths)
    }
}

#[derive(Debug, Clone, Copy)]
struct Observed {
    modified: bool,
    time: Timestamp,
}

/// Per-invocation cache over a [`FileHistory`].
#[derive(Debug)]
pub struct TimestampResolver<H> {
    history: H,
    observed: HashMap<String, Observed>,
}

impl<H: FileHistory> TimestampResolver<H> {
    pub fn new(history: H) -> Self {
        Self {
            history,
            observed: HashMap::new(),
        }
    }

    /// The underlying collaborator.
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Whether the node's file has uncommitted changes.
    pub fn is_modified(&mut self, node: &Node) -> RelyResult<bool> {
        Ok(self.observe(&node.path)?.modified)
    }

    /// Effective last-modified instant of the node.
    pub fn last_modified(&mut self, node: &Node) -> RelyResult<Timestamp> {
        let base = self.observe(&node.path)?.time;
        Ok(match node.touch {
            Some(touch) if touch > base => touch,
            _ => base,
        })
    }

    fn observe(&mut self, path: &str) -> RelyResult<Observed> {
        if let Some(seen) = self.observed.get(path) {
            return Ok(*seen);
        }
        let modified = self.history.is_modified(path)?;
        let time = if modified {
            self.history.filesystem_time(path)?
        } else {
            self.history.history_time(path)?
        };
        debug!(path, modified, %time, "Resolved modification time");
        let seen = Observed { modified, time };
        self.observed.insert(path.to_string(), seen);
        Ok(seen)
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{at, FakeHistory};
    use super::*;
    use crate::error::RelyError;

    #[test]
    fn test_unmodified_file_uses_commit_time() {
        let history = FakeHistory::default().committed("a.c", 100);
        let mut resolver = TimestampResolver::new(&history);
        assert_eq!(resolver.last_modified(&Node::new("a.c")).unwrap(), at(100));
    }

    #[test]
    fn test_modified_file_uses_filesystem_time() {
        let history = FakeHistory::default().edited("a.c", 100, 50);
        let mut resolver = TimestampResolver::new(&history);
        let node = Node::new("a.c");
        // Even an mtime older than the commit wins while edits are pending.
        assert_eq!(resolver.last_modified(&node).unwrap(), at(50));
        assert!(resolver.is_modified(&node).unwrap());
    }

    #[test]
    fn test_touch_only_moves_time_forward() {
        let history = FakeHistory::default()
            .committed("a.c", 100)
            .edited("b.c", 100, 300);
        let mut resolver = TimestampResolver::new(&history);

        let mut later = Node::new("a.c");
        later.touch = Some(at(200));
        assert_eq!(resolver.last_modified(&later).unwrap(), at(200));

        let mut earlier = Node::new("b.c");
        earlier.touch = Some(at(200));
        assert_eq!(resolver.last_modified(&earlier).unwrap(), at(300));
    }

    #[test]
    fn test_missing_history_is_fatal() {
        let mut history = FakeHistory::default().committed("a.c", 100);
        history.files.get_mut("a.c").unwrap().commit = None;
        let mut resolver = TimestampResolver::new(&history);
        assert!(matches!(
            resolver.last_modified(&Node::new("a.c")),
            Err(RelyError::TimestampFormat { .. })
        ));
    }

    #[test]
    fn test_results_are_cached_per_path() {
        let history = FakeHistory::default().committed("a.c", 100);
        let mut resolver = TimestampResolver::new(&history);
        let node = Node::new("a.c");
        resolver.last_modified(&node).unwrap();
        let after_first = history.lookups.get();
        resolver.last_modified(&node).unwrap();
        resolver.is_modified(&node).unwrap();
        assert_eq!(history.lookups.get(), after_first);
    }
}
