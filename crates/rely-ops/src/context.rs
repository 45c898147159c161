//! RelyContext - the main service for executing operations.
//!
//! Every method is one command: it loads the store fresh, validates user
//! paths with git before any mutation, and saves at most once at the end.
//! Nothing is written when a step fails.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rely_core::{Category, NodeIndex, Staleness, Walk};
use rely_git::GitBackend;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::OpsResult;
use crate::requests::*;
use crate::responses::*;
use crate::store::StoreFile;

/// The main operations context for one repository.
pub struct RelyContext {
    /// Configuration in effect.
    pub config: Config,
    backend: GitBackend,
    cwd: PathBuf,
    store: StoreFile,
}

impl RelyContext {
    /// Open the repository enclosing `cwd`.
    pub fn open(config: Config, cwd: &Path) -> OpsResult<Self> {
        let cwd = cwd.canonicalize()?;
        let backend = GitBackend::discover(&cwd)?;
        let store_path = if config.store_path.is_absolute() {
            config.store_path.clone()
        } else {
            backend.workdir().join(&config.store_path)
        };
        debug!(store = %store_path.display(), "Opened context");
        Ok(Self {
            config,
            backend,
            cwd,
            store: StoreFile::new(store_path),
        })
    }

    /// The store this context reads and writes.
    pub fn store(&self) -> &StoreFile {
        &self.store
    }

    /// Root of the repository work tree.
    pub fn root(&self) -> &Path {
        self.backend.workdir()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create an empty store.
    pub fn init(&self) -> OpsResult<InitResponse> {
        self.store.init()?;
        info!(path = %self.store.path().display(), "Initialized relations store");
        Ok(InitResponse {
            store: self.store.path().to_path_buf(),
        })
    }

    /// Declare that every file relies on every parent. All or nothing.
    pub fn add(&self, request: EdgeRequest) -> OpsResult<EdgeResponse> {
        let files = self.resolve_all(&request.files)?;
        let parents = self.resolve_all(&request.parents)?;

        let mut graph = self.store.load_or_default()?;
        let changed = graph.add_edges(&files, &parents)?;
        if changed > 0 {
            self.store.save(&graph)?;
        }
        Ok(EdgeResponse {
            files,
            parents,
            changed,
        })
    }

    /// Drop reliance edges. Missing edges are ignored.
    pub fn remove(&self, request: EdgeRequest) -> OpsResult<EdgeResponse> {
        let files = self.keys_for(&request.files)?;
        let parents = self.keys_for(&request.parents)?;

        let mut graph = self.store.load()?;
        let mut changed = 0;
        for file in &files {
            for parent in &parents {
                if graph.remove_edge(file, parent) {
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.store.save(&graph)?;
        }
        Ok(EdgeResponse {
            files,
            parents,
            changed,
        })
    }

    /// Set or clear the safe flag.
    pub fn set_safe(&self, files: &[PathBuf], safe: bool) -> OpsResult<FlagResponse> {
        let paths = if safe {
            self.resolve_all(files)?
        } else {
            self.keys_for(files)?
        };
        let mut graph = self.store.load_or_default()?;
        let mut response = FlagResponse {
            changed: vec![],
            unchanged: vec![],
        };
        for path in paths {
            if !safe && !graph.contains(&path) {
                response.unchanged.push(path);
            } else if graph.set_safe(&path, safe) == safe {
                response.unchanged.push(path);
            } else {
                response.changed.push(path);
            }
        }
        if !response.changed.is_empty() {
            self.store.save(&graph)?;
        }
        Ok(response)
    }

    /// Set (`Some`) or clear (`None`) the touch override.
    pub fn touch(&self, request: TouchRequest) -> OpsResult<FlagResponse> {
        let paths = match request.at {
            Some(_) => self.resolve_all(&request.files)?,
            None => self.keys_for(&request.files)?,
        };
        let mut graph = self.store.load_or_default()?;
        let mut response = FlagResponse {
            changed: vec![],
            unchanged: vec![],
        };
        for path in paths {
            if request.at.is_none() && !graph.contains(&path) {
                response.unchanged.push(path);
            } else if graph.set_touch(&path, request.at) == request.at {
                response.unchanged.push(path);
            } else {
                response.changed.push(path);
            }
        }
        if !response.changed.is_empty() {
            self.store.save(&graph)?;
        }
        Ok(response)
    }

    /// Migrate a node to a new path. The new path must be tracked by git;
    /// the old one only has to be known to the store.
    pub fn rename(&self, from: &Path, to: &Path) -> OpsResult<MoveResponse> {
        let from = self.backend.repo_path(from, &self.cwd)?;
        let to = self.backend.resolve(to, &self.cwd)?;
        let mut graph = self.store.load()?;
        graph.rename(&from, &to)?;
        self.store.save(&graph)?;
        Ok(MoveResponse { from, to })
    }

    /// Drop nodes that no longer carry any information.
    pub fn prune(&self) -> OpsResult<PruneResponse> {
        let mut graph = self.store.load()?;
        let removed = graph.prune();
        if !removed.is_empty() {
            self.store.save(&graph)?;
        }
        Ok(PruneResponse {
            removed,
            remaining: graph.len(),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Staleness reports.
    pub fn status(&self, request: StatusRequest) -> OpsResult<StatusResponse> {
        let graph = self.store.load()?;
        let explicit = !request.files.is_empty();
        let targets: Vec<NodeIndex> = if explicit {
            self.keys_for(&request.files)?
                .iter()
                .map(|path| graph.require(path))
                .collect::<Result<_, _>>()?
        } else {
            graph.indices()
        };

        let mut eval = Staleness::new(&graph, &self.backend);
        let mut reports = eval.reports(&targets)?;
        reports.retain(|report| {
            if request.problems_only {
                report.category.is_problem()
            } else {
                explicit || request.include_clean || report.category != Category::Clean
            }
        });
        Ok(StatusResponse { reports })
    }

    /// Direct parents or children of one file.
    pub fn neighbors(&self, file: &Path, walk: Walk) -> OpsResult<NeighborsResponse> {
        let path = self.backend.repo_path(file, &self.cwd)?;
        let graph = self.store.load()?;
        let idx = graph.require(&path)?;
        let neighbors = graph
            .neighbors(idx, walk)
            .into_iter()
            .map(|n| graph.path(n).to_string())
            .collect();
        Ok(NeighborsResponse {
            path,
            walk,
            neighbors,
        })
    }

    /// Ancestor or descendant closure of one file, with categories.
    pub fn closure(&self, file: &Path, walk: Walk) -> OpsResult<ClosureResponse> {
        let root = self.backend.repo_path(file, &self.cwd)?;
        let graph = self.store.load()?;
        let root_idx = graph.require(&root)?;

        let mut eval = Staleness::new(&graph, &self.backend);
        let mut members = vec![root_idx];
        members.extend(match walk {
            Walk::Ancestors => eval.ancestors(root_idx),
            Walk::Descendants => eval.descendants(root_idx),
        });

        let mut adjacency = BTreeMap::new();
        let mut categories = BTreeMap::new();
        for report in eval.reports(&members)? {
            categories.insert(report.path, report.category);
        }
        for &idx in &members {
            adjacency.insert(
                graph.path(idx).to_string(),
                graph
                    .neighbors(idx, walk)
                    .into_iter()
                    .map(|n| graph.path(n).to_string())
                    .collect(),
            );
        }

        Ok(ClosureResponse {
            graph: graph.subgraph(root_idx, walk),
            root,
            walk,
            adjacency,
            categories,
        })
    }

    // =========================================================================
    // Path handling
    // =========================================================================

    /// Validate paths that are about to enter the graph.
    fn resolve_all(&self, files: &[PathBuf]) -> OpsResult<Vec<String>> {
        let mut out = Vec::with_capacity(files.len());
        for file in files {
            let path = self.backend.resolve(file, &self.cwd)?;
            if !out.contains(&path) {
                out.push(path);
            }
        }
        Ok(out)
    }

    /// Store keys for paths that only need to name existing nodes.
    fn keys_for(&self, files: &[PathBuf]) -> OpsResult<Vec<String>> {
        let mut out = Vec::with_capacity(files.len());
        for file in files {
            let path = self.backend.repo_path(file, &self.cwd)?;
            if !out.contains(&path) {
                out.push(path);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{TimeZone, Utc};
    use git2::{Repository, Signature, Time};
    use rely_core::RelyError;
    use tempfile::TempDir;

    use super::*;
    use crate::error::OpsError;

    fn commit(repo: &Repository, files: &[(&str, &str)], secs: i64) {
        let root = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            fs::write(root.join(path), content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new("Test", "test@example.com", &Time::new(secs, 0)).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "test", &tree, &parents)
            .unwrap();
    }

    /// a.c committed at 1000, b.h at 2000.
    fn fixture() -> (TempDir, RelyContext) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, &[("a.c", "a"), ("b.h", "b"), ("c.h", "c")], 1_000);
        commit(&repo, &[("b.h", "b2")], 2_000);
        let ctx = RelyContext::open(Config::default(), temp.path()).unwrap();
        (temp, ctx)
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_status_without_store_is_missing_store() {
        let (_temp, ctx) = fixture();
        let err = ctx.status(StatusRequest::all()).unwrap_err();
        assert!(err.is_missing_store());
    }

    #[test]
    fn test_stale_then_safe_scenario() {
        let (_temp, ctx) = fixture();
        ctx.add(EdgeRequest::new(paths(&["a.c"]), paths(&["b.h"])))
            .unwrap();

        let status = ctx.status(StatusRequest::files(paths(&["a.c"]))).unwrap();
        assert_eq!(status.reports[0].category, Category::Stale);
        assert_eq!(status.reports[0].young_ancestors[0].path, "b.h");
        assert!(status.has_problems());

        ctx.set_safe(&paths(&["b.h"]), true).unwrap();
        let status = ctx.status(StatusRequest::files(paths(&["a.c"]))).unwrap();
        assert_eq!(status.reports[0].category, Category::Clean);
        assert!(status.reports[0].young_ancestors.is_empty());
    }

    #[test]
    fn test_cycle_leaves_store_untouched() {
        let (_temp, ctx) = fixture();
        ctx.add(EdgeRequest::new(paths(&["a.c"]), paths(&["b.h"])))
            .unwrap();
        let before = fs::read_to_string(ctx.store().path()).unwrap();

        let err = ctx
            .add(EdgeRequest::new(paths(&["c.h", "b.h"]), paths(&["a.c"])))
            .unwrap_err();
        assert!(matches!(err, OpsError::Core(RelyError::Cycle { .. })));
        assert_eq!(fs::read_to_string(ctx.store().path()).unwrap(), before);
    }

    #[test]
    fn test_untracked_file_is_rejected_before_mutation() {
        let (temp, ctx) = fixture();
        fs::write(temp.path().join("scratch.c"), "x").unwrap();
        let err = ctx
            .add(EdgeRequest::new(paths(&["scratch.c"]), paths(&["b.h"])))
            .unwrap_err();
        assert!(matches!(err, OpsError::Core(RelyError::Validation { .. })));
        assert!(!ctx.store().exists());
    }

    #[test]
    fn test_touch_makes_file_fresh() {
        let (_temp, ctx) = fixture();
        ctx.add(EdgeRequest::new(paths(&["a.c"]), paths(&["b.h"])))
            .unwrap();
        let at = Utc.timestamp_opt(3_000, 0).unwrap();
        let touched = ctx
            .touch(TouchRequest {
                files: paths(&["a.c"]),
                at: Some(at),
            })
            .unwrap();
        assert_eq!(touched.changed, vec!["a.c".to_string()]);

        let status = ctx.status(StatusRequest::files(paths(&["a.c"]))).unwrap();
        assert_eq!(status.reports[0].category, Category::Clean);

        ctx.touch(TouchRequest {
            files: paths(&["a.c"]),
            at: None,
        })
        .unwrap();
        let status = ctx.status(StatusRequest::files(paths(&["a.c"]))).unwrap();
        assert_eq!(status.reports[0].category, Category::Stale);
    }

    #[test]
    fn test_problems_only_filter() {
        let (_temp, ctx) = fixture();
        ctx.add(EdgeRequest::new(paths(&["a.c", "c.h"]), paths(&["b.h"])))
            .unwrap();
        let status = ctx
            .status(StatusRequest {
                problems_only: true,
                ..StatusRequest::all()
            })
            .unwrap();
        let stale: Vec<&str> = status.reports.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(stale, vec!["a.c", "c.h"]);
        assert_eq!(status.counts().get("stale"), Some(&2));
    }

    #[test]
    fn test_remove_and_prune() {
        let (_temp, ctx) = fixture();
        ctx.add(EdgeRequest::new(paths(&["a.c"]), paths(&["b.h"])))
            .unwrap();
        let removed = ctx
            .remove(EdgeRequest::new(paths(&["a.c"]), paths(&["b.h"])))
            .unwrap();
        assert_eq!(removed.changed, 1);
        let again = ctx
            .remove(EdgeRequest::new(paths(&["a.c"]), paths(&["b.h"])))
            .unwrap();
        assert_eq!(again.changed, 0);

        let pruned = ctx.prune().unwrap();
        assert_eq!(pruned.removed, vec!["a.c".to_string(), "b.h".to_string()]);
        assert_eq!(pruned.remaining, 0);
    }

    #[test]
    fn test_closure_and_neighbors() {
        let (_temp, ctx) = fixture();
        ctx.add(EdgeRequest::new(paths(&["a.c"]), paths(&["b.h"])))
            .unwrap();
        ctx.add(EdgeRequest::new(paths(&["b.h"]), paths(&["c.h"])))
            .unwrap();

        let parents = ctx.neighbors(Path::new("a.c"), Walk::Ancestors).unwrap();
        assert_eq!(parents.neighbors, vec!["b.h".to_string()]);

        let closure = ctx.closure(Path::new("a.c"), Walk::Ancestors).unwrap();
        assert_eq!(closure.adjacency.len(), 3);
        assert_eq!(closure.adjacency["b.h"], vec!["c.h".to_string()]);
        assert_eq!(closure.categories["a.c"], Category::Stale);
        assert_eq!(closure.graph.node_count(), 3);
    }

    #[test]
    fn test_rename_migrates_node() {
        let (temp, ctx) = fixture();
        ctx.add(EdgeRequest::new(paths(&["a.c"]), paths(&["b.h"])))
            .unwrap();

        let repo = Repository::open(temp.path()).unwrap();
        commit(&repo, &[("main.c", "a")], 4_000);

        let moved = ctx.rename(Path::new("a.c"), Path::new("main.c")).unwrap();
        assert_eq!(moved.to, "main.c");
        let graph = ctx.store().load().unwrap();
        assert!(!graph.contains("a.c"));
        assert_eq!(graph.parents_of("main.c").unwrap(), vec!["b.h"]);
    }
}
