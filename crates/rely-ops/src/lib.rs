//! Rely Operations Layer
//!
//! Typed commands over a repository's relations store. The CLI is a thin
//! shell around this crate.
//!
//! ## Architecture
//!
//! - **Requests**: Typed input DTOs for each operation
//! - **Responses**: Typed output DTOs with all relevant data
//! - **RelyContext**: Opens the repository and executes operations
//! - **StoreFile**: The tab-separated relations store on disk
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use rely_ops::{Config, EdgeRequest, RelyContext, StatusRequest};
//!
//! fn main() -> Result<(), rely_ops::OpsError> {
//!     let ctx = RelyContext::open(Config::load()?, Path::new("."))?;
//!     ctx.add(EdgeRequest::new(
//!         vec![PathBuf::from("src/main.c")],
//!         vec![PathBuf::from("include/api.h")],
//!     ))?;
//!
//!     let status = ctx.status(StatusRequest::all())?;
//!     println!("{} stale", status.counts().get("stale").unwrap_or(&0));
//!     Ok(())
//! }
//! ```

mod config;
mod context;
mod error;
mod requests;
mod responses;
mod store;

// Re-export public API
pub use config::{ColorMode, Config, DEFAULT_STORE_PATH};
pub use context::RelyContext;
pub use error::{OpsError, OpsResult};
pub use requests::*;
pub use responses::*;
pub use store::{parse, render, StoreFile};
