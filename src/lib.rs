//! Crate entry point for **content-sync**.
//!
//! Glue between a content site and its SQL storage: fetch a collection's
//! compressed dump, check it against the locally stored version marker and
//! import it when they differ. Also scrapes git remote metadata and downloads
//! repository tarballs for content sources.
//!
//! The `pub use` re-exports make the commands and main types reachable from
//! the crate root.

pub mod api;
pub mod config;
pub mod database;
pub mod dump;
pub mod git;
pub mod integrity;
mod logging;
mod paths;
mod progress;
mod runtime;

pub use api::{ContentApi, DumpSource};
pub use config::{ContentConfig, ReplayStrategy, RuntimeMode, load_config};
pub use database::{AdapterLoader, DatabaseAdapter, Row};
pub use git::{cmd_download, cmd_git_info, cmd_parse_url};
pub use integrity::{IntegrityChecker, IntegrityState};
pub use logging::init_logging;
pub use paths::{Paths, paths};
pub use runtime::{Content, cmd_import, cmd_query};
