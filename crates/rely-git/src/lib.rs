//! Git-backed file history for rely.
//!
//! [`GitBackend`] answers the three questions the engine asks of version
//! control: does a file have uncommitted changes, when was it last committed,
//! and which tracked repository path does a user-supplied path name.
//!
//! Status is read once per backend. Commit times come from a single revision
//! walk over `HEAD` covering every path requested together (see
//! [`FileHistory::prefetch`]); results are cached for the backend's lifetime.

use std::cell::{OnceCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{FixedOffset, TimeZone, Utc};
use git2::{ErrorCode, Repository, Sort, Status, StatusOptions};
use tracing::debug;

use rely_core::{from_system_time, FileHistory, RelyError, RelyResult, Timestamp};

#[derive(Debug, Clone)]
enum LastCommit {
    At(Timestamp),
    Invalid(String),
    Untouched,
}

/// Repository-backed implementation of [`FileHistory`].
pub struct GitBackend {
    repo: Repository,
    workdir: PathBuf,
    modified: OnceCell<HashSet<String>>,
    commits: RefCell<HashMap<String, LastCommit>>,
}

impl GitBackend {
    /// Open the repository enclosing `start`.
    pub fn discover(start: &Path) -> RelyResult<Self> {
        let repo = Repository::discover(start).map_err(|e| {
            RelyError::validation(
                start.display().to_string(),
                format!("not in a git repository ({})", e.message()),
            )
        })?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| RelyError::Vcs {
                message: "bare repositories have no work tree".to_string(),
            })?
            .canonicalize()?;
        debug!(workdir = %workdir.display(), "Opened repository");
        Ok(Self {
            repo,
            workdir,
            modified: OnceCell::new(),
            commits: RefCell::new(HashMap::new()),
        })
    }

    /// Root of the work tree.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Turn a user-supplied path into a tracked, repository-relative path.
    ///
    /// Relative paths are taken from `cwd`. The file must exist, be a regular
    /// file inside the work tree and be present in the index.
    pub fn resolve(&self, user_path: &Path, cwd: &Path) -> RelyResult<String> {
        let shown = user_path.display().to_string();
        let absolute = if user_path.is_absolute() {
            user_path.to_path_buf()
        } else {
            cwd.join(user_path)
        };

        let meta = std::fs::metadata(&absolute).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RelyError::validation(&shown, "no such file"),
            _ => RelyError::validation(&shown, e.to_string()),
        })?;
        if !meta.is_file() {
            return Err(RelyError::validation(&shown, "not a regular file"));
        }

        let canonical = absolute.canonicalize()?;
        let relative = canonical
            .strip_prefix(&self.workdir)
            .map_err(|_| RelyError::validation(&shown, "outside the repository"))?;
        let path = to_repo_path(relative)
            .ok_or_else(|| RelyError::validation(&shown, "path is not valid UTF-8"))?;

        if !self.is_tracked(&path)? {
            return Err(RelyError::validation(&shown, "not tracked by git"));
        }
        Ok(path)
    }

    /// Repository-relative form of a path that may no longer exist on disk.
    ///
    /// Purely lexical: `.` and `..` are folded, nothing is checked against
    /// the work tree or the index. `cwd` must be canonical.
    pub fn repo_path(&self, user_path: &Path, cwd: &Path) -> RelyResult<String> {
        let shown = user_path.display().to_string();
        let absolute = if user_path.is_absolute() {
            user_path.to_path_buf()
        } else {
            cwd.join(user_path)
        };

        let mut folded = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    folded.pop();
                }
                other => folded.push(other.as_os_str()),
            }
        }
        let relative = folded
            .strip_prefix(&self.workdir)
            .map_err(|_| RelyError::validation(&shown, "outside the repository"))?;
        to_repo_path(relative)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| RelyError::validation(&shown, "not a file path inside the repository"))
    }

    /// Whether a repository-relative path is in the index.
    pub fn is_tracked(&self, path: &str) -> RelyResult<bool> {
        let index = self.repo.index().map_err(vcs)?;
        Ok(index.get_path(Path::new(path), 0).is_some())
    }

    fn modified_paths(&self) -> RelyResult<&HashSet<String>> {
        if let Some(set) = self.modified.get() {
            return Ok(set);
        }
        let mut opts = StatusOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .recurse_untracked_dirs(false);
        let statuses = self.repo.statuses(Some(&mut opts)).map_err(vcs)?;

        let set: HashSet<String> = statuses
            .iter()
            .filter(|entry| {
                let status = entry.status();
                !status.is_empty()
                    && !status.intersects(Status::IGNORED | Status::WT_NEW | Status::CURRENT)
            })
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect();
        debug!(count = set.len(), "Read working tree status");
        Ok(self.modified.get_or_init(|| set))
    }

    /// Walk `HEAD` history once, recording the newest commit touching each path.
    fn walk_history(&self, paths: &[&str]) -> RelyResult<()> {
        let mut pending: HashSet<String> = {
            let cache = self.commits.borrow();
            paths
                .iter()
                .filter(|p| !cache.contains_key(**p))
                .map(|p| p.to_string())
                .collect()
        };
        if pending.is_empty() {
            return Ok(());
        }

        let mut found: HashMap<String, LastCommit> = HashMap::new();
        let mut visited = 0usize;
        match self.repo.head() {
            Err(e) if e.code() == ErrorCode::UnbornBranch => {}
            Err(e) => return Err(vcs(e)),
            Ok(_) => {
                let mut revwalk = self.repo.revwalk().map_err(vcs)?;
                revwalk.push_head().map_err(vcs)?;
                revwalk
                    .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
                    .map_err(vcs)?;

                for oid in revwalk {
                    if pending.is_empty() {
                        break;
                    }
                    visited += 1;
                    let commit = self.repo.find_commit(oid.map_err(vcs)?).map_err(vcs)?;
                    let tree = commit.tree().map_err(vcs)?;
                    let parent_tree = match commit.parent_count() {
                        0 => None,
                        _ => Some(commit.parent(0).and_then(|p| p.tree()).map_err(vcs)?),
                    };

                    let touched: Vec<String> = pending
                        .iter()
                        .filter(|path| {
                            let here = tree.get_path(Path::new(path)).ok().map(|e| e.id());
                            let before = parent_tree
                                .as_ref()
                                .and_then(|t| t.get_path(Path::new(path)).ok())
                                .map(|e| e.id());
                            here.is_some() && here != before
                        })
                        .cloned()
                        .collect();

                    if touched.is_empty() {
                        continue;
                    }
                    let when = commit_time(&commit);
                    for path in touched {
                        pending.remove(&path);
                        found.insert(path, when.clone());
                    }
                }
            }
        }

        debug!(
            resolved = found.len(),
            untouched = pending.len(),
            commits = visited,
            "Walked history"
        );
        let mut cache = self.commits.borrow_mut();
        cache.extend(found);
        cache.extend(pending.into_iter().map(|p| (p, LastCommit::Untouched)));
        Ok(())
    }
}

impl FileHistory for GitBackend {
    fn is_modified(&self, path: &str) -> RelyResult<bool> {
        Ok(self.modified_paths()?.contains(path))
    }

    fn filesystem_time(&self, path: &str) -> RelyResult<Timestamp> {
        let meta = std::fs::metadata(self.workdir.join(path)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RelyError::validation(path, "missing from the work tree"),
            _ => RelyError::from(e),
        })?;
        Ok(from_system_time(meta.modified()?))
    }

    fn history_time(&self, path: &str) -> RelyResult<Timestamp> {
        self.walk_history(&[path])?;
        match self.commits.borrow().get(path) {
            Some(LastCommit::At(time)) => Ok(*time),
            Some(LastCommit::Invalid(message)) => Err(RelyError::timestamp(path, message.clone())),
            Some(LastCommit::Untouched) | None => Err(RelyError::timestamp(
                path,
                "no commit on HEAD touches this file",
            )),
        }
    }

    fn prefetch(&self, paths: &[&str]) -> RelyResult<()> {
        self.modified_paths()?;
        self.walk_history(paths)
    }
}

fn commit_time(commit: &git2::Commit<'_>) -> LastCommit {
    let time = commit.time();
    let Some(offset) = FixedOffset::east_opt(time.offset_minutes() * 60) else {
        return LastCommit::Invalid(format!(
            "commit {} has timezone offset {} minutes",
            commit.id(),
            time.offset_minutes()
        ));
    };
    match offset.timestamp_opt(time.seconds(), 0).single() {
        Some(at) => LastCommit::At(at.with_timezone(&Utc)),
        None => LastCommit::Invalid(format!(
            "commit {} has out-of-range time {}",
            commit.id(),
            time.seconds()
        )),
    }
}

/// `/`-separated form of a relative path, as git stores it.
fn to_repo_path(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

fn vcs(err: git2::Error) -> RelyError {
    RelyError::Vcs {
        message: err.message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;
    use git2::{Signature, Time};
    use tempfile::TempDir;

    use super::*;

    /// Stage `files` (path, content) and commit them at `secs` with `offset` minutes.
    fn commit(repo: &Repository, files: &[(&str, &str)], secs: i64, offset: i32) {
        let root = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new("Test", "test@example.com", &Time::new(secs, offset)).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "test", &tree, &parents)
            .unwrap();
    }

    fn fixture() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, &[("a.c", "a1"), ("inc/b.h", "b1")], 1_000, 0);
        commit(&repo, &[("inc/b.h", "b2")], 2_000, 120);
        (temp, repo)
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_history_time_is_newest_touching_commit() {
        let (temp, _repo) = fixture();
        let backend = GitBackend::discover(temp.path()).unwrap();
        assert_eq!(backend.history_time("a.c").unwrap(), at(1_000));
        assert_eq!(backend.history_time("inc/b.h").unwrap(), at(2_000));
    }

    #[test]
    fn test_prefetch_fills_cache_in_one_walk() {
        let (temp, _repo) = fixture();
        let backend = GitBackend::discover(temp.path()).unwrap();
        backend.prefetch(&["a.c", "inc/b.h"]).unwrap();
        assert_eq!(backend.commits.borrow().len(), 2);
        assert_eq!(backend.history_time("a.c").unwrap(), at(1_000));
    }

    #[test]
    fn test_uncommitted_file_has_no_history() {
        let (temp, repo) = fixture();
        fs::write(temp.path().join("new.c"), "x").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("new.c")).unwrap();
        index.write().unwrap();

        let backend = GitBackend::discover(temp.path()).unwrap();
        assert!(backend.is_modified("new.c").unwrap());
        assert!(matches!(
            backend.history_time("new.c"),
            Err(RelyError::TimestampFormat { .. })
        ));
    }

    #[test]
    fn test_status_reports_edits_only() {
        let (temp, _repo) = fixture();
        fs::write(temp.path().join("a.c"), "edited").unwrap();
        fs::write(temp.path().join("untracked.c"), "x").unwrap();

        let backend = GitBackend::discover(temp.path()).unwrap();
        assert!(backend.is_modified("a.c").unwrap());
        assert!(!backend.is_modified("inc/b.h").unwrap());
        assert!(!backend.is_modified("untracked.c").unwrap());
        assert!(backend.filesystem_time("a.c").is_ok());
    }

    #[test]
    fn test_resolve_accepts_tracked_files_only() {
        let (temp, _repo) = fixture();
        fs::write(temp.path().join("untracked.c"), "x").unwrap();
        let backend = GitBackend::discover(temp.path()).unwrap();
        let root = temp.path();

        assert_eq!(backend.resolve(Path::new("inc/b.h"), root).unwrap(), "inc/b.h");
        assert_eq!(
            backend.resolve(Path::new("b.h"), &root.join("inc")).unwrap(),
            "inc/b.h"
        );
        assert_eq!(
            backend.resolve(&root.join("a.c"), Path::new("/")).unwrap(),
            "a.c"
        );

        for (path, reason) in [
            ("missing.c", "no such file"),
            ("inc", "not a regular file"),
            ("untracked.c", "not tracked by git"),
        ] {
            match backend.resolve(Path::new(path), root) {
                Err(RelyError::Validation { reason: got, .. }) => assert_eq!(got, reason),
                other => panic!("{path}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_repo_path_handles_deleted_files() {
        let (temp, _repo) = fixture();
        let backend = GitBackend::discover(temp.path()).unwrap();
        let cwd = temp.path().canonicalize().unwrap().join("inc");

        assert_eq!(backend.repo_path(Path::new("gone.h"), &cwd).unwrap(), "inc/gone.h");
        assert_eq!(backend.repo_path(Path::new("../a.c"), &cwd).unwrap(), "a.c");
        assert!(backend.repo_path(Path::new("../../x"), &cwd).is_err());
        assert!(backend.repo_path(Path::new(".."), &cwd).is_err());
    }

    #[test]
    fn test_to_repo_path_uses_forward_slashes() {
        assert_eq!(
            to_repo_path(Path::new("src").join("x").join("y.rs").as_path()).as_deref(),
            Some("src/x/y.rs")
        );
        assert_eq!(to_repo_path(Path::new("../escape")), None);
    }
}
