//! Relations store on disk.
//!
//! One record per line, tab separated:
//!
//! ```text
//! path <TAB> safe <TAB> touch <TAB> parent1 <TAB> parent2 ...
//! ```
//!
//! `safe` is `0`, `1` or empty. `touch` is empty, RFC 3339, or integer unix
//! seconds (older stores). Blank lines and `#` comments are skipped.
//!
//! A record path starting with `#` or `\` is written with one extra leading
//! `\`, so it cannot be mistaken for a comment. Parent fields never need it.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rely_core::{RelationGraph, RelyError, Timestamp};
use tracing::{debug, info, warn};

use crate::error::{OpsError, OpsResult};

const HEADER: &str = "# rely relations v1";

/// Handle on the store file.
#[derive(Debug, Clone)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create an empty store. Refuses to overwrite an existing one.
    pub fn init(&self) -> OpsResult<()> {
        if self.exists() {
            return Err(OpsError::StoreExists {
                path: self.path.clone(),
            });
        }
        self.save(&RelationGraph::new())
    }

    /// Load the store, or `MissingStore` if there is none.
    pub fn load(&self) -> OpsResult<RelationGraph> {
        if !self.exists() {
            return Err(OpsError::MissingStore {
                path: self.path.clone(),
            });
        }
        let text = std::fs::read_to_string(&self.path)?;
        let graph = parse(&text, &self.path)?;
        debug!(
            path = %self.path.display(),
            nodes = graph.len(),
            edges = graph.edge_count(),
            "Loaded relations store"
        );
        Ok(graph)
    }

    /// Load the store, starting empty when there is none yet.
    pub fn load_or_default(&self) -> OpsResult<RelationGraph> {
        match self.load() {
            Err(err) if err.is_missing_store() => Ok(RelationGraph::new()),
            other => other,
        }
    }

    /// Replace the store with `graph`: write a temp file, sync, then rename.
    pub fn save(&self, graph: &RelationGraph) -> OpsResult<()> {
        let text = render(graph)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        drop(file);
        if let Err(err) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(err.into());
        }

        info!(
            path = %self.path.display(),
            nodes = graph.len(),
            edges = graph.edge_count(),
            "Saved relations store"
        );
        Ok(())
    }
}

/// Parse store text into a graph. `origin` is only used in error messages.
pub fn parse(text: &str, origin: &Path) -> OpsResult<RelationGraph> {
    let mut graph = RelationGraph::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut edges: Vec<(usize, String, String)> = Vec::new();

    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split('\t');
        let field = fields.next().unwrap_or_default();
        let path = field.strip_prefix('\\').unwrap_or(field);
        if path.is_empty() {
            return Err(OpsError::corrupt(origin, line_no, "empty path"));
        }
        if let Some(first) = seen.insert(path.to_string(), line_no) {
            return Err(OpsError::corrupt(
                origin,
                line_no,
                format!("{} already recorded on line {}", path, first),
            ));
        }

        let safe = match fields.next().unwrap_or_default() {
            "" | "0" => false,
            "1" => true,
            other => {
                return Err(OpsError::corrupt(
                    origin,
                    line_no,
                    format!("safe flag must be 0 or 1, found {:?}", other),
                ))
            }
        };
        let touch = parse_touch(fields.next().unwrap_or_default())
            .map_err(|message| OpsError::corrupt(origin, line_no, message))?;

        graph.ensure_node(path);
        graph.set_safe(path, safe);
        graph.set_touch(path, touch);
        edges.extend(
            fields
                .filter(|parent| !parent.is_empty())
                .map(|parent| (line_no, path.to_string(), parent.to_string())),
        );
    }

    for (line_no, child, parent) in edges {
        graph.add_edge(&child, &parent).map_err(|err| match err {
            RelyError::Cycle { .. } => OpsError::corrupt(
                origin,
                line_no,
                format!("{} and {} rely on each other", child, parent),
            ),
            other => other.into(),
        })?;
    }

    for idx in graph.indices() {
        let path = graph.path(idx);
        if !seen.contains_key(path) {
            warn!(path, "Parent has no record of its own; tracking it as a placeholder");
        }
    }
    Ok(graph)
}

/// Serialise a graph in store format.
pub fn render(graph: &RelationGraph) -> OpsResult<String> {
    let mut out = String::from(HEADER);
    out.push('\n');
    for record in graph.records() {
        for path in std::iter::once(&record.path).chain(&record.parents) {
            if path.contains(['\t', '\n', '\r']) {
                return Err(OpsError::UnstorablePath { path: path.clone() });
            }
        }
        if record.path.starts_with(['#', '\\']) {
            out.push('\\');
        }
        out.push_str(&record.path);
        out.push('\t');
        out.push(if record.safe { '1' } else { '0' });
        out.push('\t');
        if let Some(touch) = record.touch {
            out.push_str(&touch.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        }
        for parent in &record.parents {
            out.push('\t');
            out.push_str(parent);
        }
        out.push('\n');
    }
    Ok(out)
}

fn parse_touch(field: &str) -> Result<Option<Timestamp>, String> {
    if field.is_empty() {
        return Ok(None);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(field) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    field
        .parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(Some)
        .ok_or_else(|| format!("unreadable touch timestamp {:?}", field))
}
