//! Git metadata and repository download.
//!
//! - [`parse_github_url`] / [`parse_git_url`]: pure URL parsing
//! - [`get_local_git_info`]: reads `remote.origin.url` through `git2`
//! - [`get_git_env`]: CI environment variables
//! - [`download_repository`]: tarball download with an ETag cache

mod download;
mod info;
mod url;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::path::Path;
use std::time::Duration;

use crate::api::http_client;
use crate::progress::{finish, spinner};

pub use download::{DownloadOutcome, RepositoryCache, download_repository, extract_stripped, read_cache};
pub use info::{GitInfo, get_git_env, get_local_git_info, git_env_from};
pub use url::{GitHubUrl, GitUrl, parse_git_url, parse_github_url};

/// CLI command: print the repository identity for `root`.
///
/// The local `.git/config` is preferred; CI environment variables are the fallback.
pub fn cmd_git_info(root: &Path) -> Result<()> {
    let (info, from) = match get_local_git_info(root) {
        Some(info) => (info, "git config"),
        None => (get_git_env(), "environment"),
    };
    if info.url.is_empty() && info.name.is_empty() {
        bail!("no git remote found in {} or the environment", root.display());
    }
    println!("{} {}", "name: ".bold(), info.name);
    println!("{} {}", "owner:".bold(), info.owner);
    println!("{} {}", "url:  ".bold(), info.url.cyan());
    println!("{}", format!("(from {})", from).dimmed());
    Ok(())
}

/// CLI command: print a GitHub tree URL as JSON.
pub fn cmd_parse_url(url: &str) -> Result<()> {
    let parsed = parse_github_url(url).with_context(|| format!("not a GitHub URL: {}", url))?;
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

/// CLI command: download and extract a repository tarball into `dir`.
pub fn cmd_download(url: &str, dir: &Path, timeout: Duration) -> Result<()> {
    let pb = spinner(None, format!("downloading {}", url));
    let client = http_client(timeout)?;
    match download_repository(&client, url, dir) {
        Ok(DownloadOutcome::Cached) => {
            finish(&pb, true, format!("up to date ({})", dir.display()));
            Ok(())
        }
        Ok(DownloadOutcome::Downloaded) => {
            finish(&pb, true, format!("extracted into {}", dir.display()));
            Ok(())
        }
        Err(e) => {
            finish(&pb, false, format!("download failed: {}", e));
            Err(e)
        }
    }
}
