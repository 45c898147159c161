//! Commands that change the relations store.

use std::path::{Path, PathBuf};

use anyhow::Result;
use rely_core::Timestamp;
use rely_ops::{EdgeRequest, FlagResponse, RelyContext, TouchRequest};

/// Create an empty store.
pub fn init(ctx: &RelyContext, quiet: bool) -> Result<()> {
    let response = ctx.init()?;
    if !quiet {
        println!("✅ Initialized relations store at {}", response.store.display());
    }
    Ok(())
}

/// Add edges from every file to every parent.
pub fn add(
    ctx: &RelyContext,
    files: Vec<PathBuf>,
    parents: Vec<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let response = ctx.add(EdgeRequest::new(files, parents))?;
    if !quiet {
        for file in &response.files {
            println!("{} relies on {}", file, response.parents.join(", "));
        }
        if response.changed == 0 {
            println!("(nothing new)");
        }
    }
    Ok(())
}

/// Remove edges between every file and every parent.
pub fn remove(
    ctx: &RelyContext,
    files: Vec<PathBuf>,
    parents: Vec<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let response = ctx.remove(EdgeRequest::new(files, parents))?;
    if !quiet {
        println!("Removed {} edge(s)", response.changed);
    }
    Ok(())
}

/// Set or clear the safe flag.
pub fn safe(ctx: &RelyContext, files: &[PathBuf], safe: bool, quiet: bool) -> Result<()> {
    let response = ctx.set_safe(files, safe)?;
    if !quiet {
        let what = if safe { "marked safe" } else { "no longer safe" };
        report_flags(&response, what);
    }
    Ok(())
}

/// Set (`Some`) or clear (`None`) the touch override.
pub fn touch(
    ctx: &RelyContext,
    files: Vec<PathBuf>,
    at: Option<Timestamp>,
    quiet: bool,
) -> Result<()> {
    let response = ctx.touch(TouchRequest { files, at })?;
    if !quiet {
        match at {
            Some(at) => report_flags(&response, &format!("touched at {}", at.to_rfc3339())),
            None => report_flags(&response, "untouched"),
        }
    }
    Ok(())
}

/// Move a node to a new path.
pub fn rename(ctx: &RelyContext, from: &Path, to: &Path, quiet: bool) -> Result<()> {
    let response = ctx.rename(from, to)?;
    if !quiet {
        println!("Moved {} -> {}", response.from, response.to);
    }
    Ok(())
}

/// Forget idle nodes.
pub fn prune(ctx: &RelyContext, quiet: bool) -> Result<()> {
    let response = ctx.prune()?;
    if !quiet {
        for path in &response.removed {
            println!("Pruned {}", path);
        }
        println!(
            "{} removed, {} remaining",
            response.removed.len(),
            response.remaining
        );
    }
    Ok(())
}

fn report_flags(response: &FlagResponse, what: &str) {
    for path in &response.changed {
        println!("{}: {}", path, what);
    }
    for path in &response.unchanged {
        println!("{}: unchanged", path);
    }
}
