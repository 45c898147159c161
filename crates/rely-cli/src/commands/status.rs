//! Status command implementation.

use std::path::PathBuf;

use anyhow::Result;
use rely_ops::{RelyContext, StatusRequest};
use tracing::debug;

use crate::render;

/// Print staleness reports. Returns whether anything reported is stale.
pub fn execute(
    ctx: &RelyContext,
    files: Vec<PathBuf>,
    problems_only: bool,
    json: bool,
    verbose: bool,
    quiet: bool,
) -> Result<bool> {
    let request = StatusRequest {
        files,
        problems_only,
        include_clean: ctx.config.show_clean,
    };
    let response = ctx.status(request)?;
    debug!(reports = response.reports.len(), "Computed status");

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render::status(&response.reports, verbose));
        if !quiet {
            println!("{}", render::summary(&response.counts()));
        }
    }
    Ok(response.has_problems())
}
