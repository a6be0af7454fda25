//! # content-sync
//!
//! Features:
//! - `content-sync import [COLLECTION...]` verifies collections and imports stale dumps
//! - `content-sync query COLLECTION SQL` runs SQL locally (or `--remote` on the server)
//! - `content-sync git-info [DIR]` prints the repository identity
//! - `content-sync parse-url URL` splits a GitHub tree URL
//! - `content-sync download URL DIR` fetches and extracts a repository tarball
//! - `content-sync home` prints the config directory and config file
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::{Parser, Subcommand};
use content_sync::{
    cmd_download, cmd_git_info, cmd_import, cmd_parse_url, cmd_query, init_logging, paths,
};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "content-sync",
    version,
    about = "content-sync - content database import and git metadata tools",
    arg_required_else_help = true
)]
struct Cli {
    /// Path to content.toml (defaults to $CONTENT_SYNC_CONFIG or the config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Verify collections and import stale dumps
    Import {
        /// Collections to check (all manifest collections when empty)
        collections: Vec<String>,
    },
    /// Run SQL against a collection and print the rows as JSON
    Query {
        collection: String,
        sql: String,
        /// Use the server-side query endpoint
        #[arg(long)]
        remote: bool,
    },
    /// Print repository name, owner and URL
    GitInfo {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Split a GitHub tree URL into org, repo, branch and path
    ParseUrl { url: String },
    /// Download a repository tarball and extract it
    Download {
        url: String,
        dir: PathBuf,
        /// Request timeout in seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Print the content-sync config directory and config file
    Home,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    let config = cli.config.as_deref();

    match cli.cmd {
        Cmd::Import { collections } => cmd_import(config, collections),
        Cmd::Query {
            collection,
            sql,
            remote,
        } => cmd_query(config, &collection, &sql, remote),
        Cmd::GitInfo { dir } => cmd_git_info(&dir),
        Cmd::ParseUrl { url } => cmd_parse_url(&url),
        Cmd::Download { url, dir, timeout } => {
            cmd_download(&url, &dir, Duration::from_secs(timeout))
        }
        Cmd::Home => {
            let p = paths()?;
            println!("{}", p.home.display());
            println!("config: {}", p.config.display());
            Ok(())
        }
    }
}
