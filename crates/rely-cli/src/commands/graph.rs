//! Neighbour and closure views.

use std::path::Path;

use anyhow::Result;
use petgraph::dot::{Config as DotConfig, Dot};
use rely_core::Walk;
use rely_ops::RelyContext;

use crate::render;

/// How to print a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Tree,
    Dot,
    Json,
}

impl Format {
    pub fn pick(dot: bool, json: bool) -> Self {
        match (dot, json) {
            (true, _) => Format::Dot,
            (_, true) => Format::Json,
            _ => Format::Tree,
        }
    }
}

/// Print direct parents or children, one per line.
pub fn neighbors(ctx: &RelyContext, file: &Path, walk: Walk) -> Result<()> {
    let response = ctx.neighbors(file, walk)?;
    for path in &response.neighbors {
        println!("{}", path);
    }
    Ok(())
}

/// Print the ancestor or descendant closure of one file.
pub fn closure(ctx: &RelyContext, file: &Path, walk: Walk, format: Format) -> Result<()> {
    let response = ctx.closure(file, walk)?;
    match format {
        Format::Tree => print!(
            "{}",
            render::tree(&response.root, &response.adjacency, &response.categories)
        ),
        Format::Dot => println!(
            "{:?}",
            Dot::with_config(&response.graph, &[DotConfig::EdgeNoLabel])
        ),
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
    }
    Ok(())
}
