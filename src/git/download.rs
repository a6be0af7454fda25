use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, HeaderMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::paths::{CACHE_FILE, CLONE_TARBALL};

/// Contents of `.content.cache.json` next to a downloaded repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCache {
    pub url: String,
    pub etag: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The remote ETag matched the cache; nothing was transferred.
    Cached,
    /// The archive was downloaded and extracted.
    Downloaded,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn etag_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Read the cache file; a missing or unreadable file counts as no cache.
pub fn read_cache(path: &Path) -> Option<RepositoryCache> {
    let txt = fs::read_to_string(path).ok()?;
    serde_json::from_str(&txt).ok()
}

fn write_cache(path: &Path, cache: &RepositoryCache) -> Result<()> {
    let txt = serde_json::to_string_pretty(cache)?;
    fs::write(path, txt).with_context(|| format!("failed to write {}", path.display()))
}

/// Download the gzip tarball at `url` and extract it into `dir`.
///
/// Process:
/// 1. If `dir` holds a cache file, `HEAD url` and compare ETags.
///    - Equal → only refresh `updatedAt` and return [`DownloadOutcome::Cached`].
/// 2. Download the archive to `<dir>/.content.clone.tar.gz`.
/// 3. Extract it into `dir`, dropping the archive's top-level directory.
/// 4. Write a fresh cache file.
///
/// The temporary tarball is removed whether or not extraction succeeds.
pub fn download_repository(client: &Client, url: &str, dir: &Path) -> Result<DownloadOutcome> {
    let cache_file = dir.join(CACHE_FILE);
    let tar_file = dir.join(CLONE_TARBALL);

    if let Some(cache) = read_cache(&cache_file) {
        let resp = client
            .head(url)
            .send()
            .with_context(|| format!("HEAD {}", url))?;
        let etag = etag_of(resp.headers());
        if etag.is_some() && etag == cache.etag {
            debug!(url, etag = ?etag, "repository unchanged");
            write_cache(
                &cache_file,
                &RepositoryCache {
                    updated_at: now(),
                    ..cache
                },
            )?;
            return Ok(DownloadOutcome::Cached);
        }
    }

    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let fetched = fetch_and_extract(client, url, &tar_file, dir);
    let _ = fs::remove_file(&tar_file);
    let (etag, entries) = fetched?;

    let stamp = now();
    write_cache(
        &cache_file,
        &RepositoryCache {
            url: url.to_string(),
            etag,
            created_at: stamp.clone(),
            updated_at: stamp,
        },
    )?;
    info!(url, dir = %dir.display(), entries, "repository downloaded");
    Ok(DownloadOutcome::Downloaded)
}

fn fetch_and_extract(
    client: &Client,
    url: &str,
    tar_file: &Path,
    dir: &Path,
) -> Result<(Option<String>, usize)> {
    let mut resp = client
        .get(url)
        .send()
        .with_context(|| format!("GET {}", url))?
        .error_for_status()?;
    let etag = etag_of(resp.headers());
    {
        let mut out = fs::File::create(tar_file)?;
        std::io::copy(&mut resp, &mut out)?;
    }
    let entries = extract_stripped(tar_file, dir)?;
    Ok((etag, entries))
}

/// Drop the first component of an archive path; `None` if nothing safe remains.
fn strip_root(path: &Path) -> Option<PathBuf> {
    let stripped: PathBuf = path.components().skip(1).collect();
    let safe = stripped
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    (safe && !stripped.as_os_str().is_empty()).then_some(stripped)
}

/// Link targets may only name paths below the link itself.
fn link_target_is_safe(target: &Path) -> bool {
    target
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Whether `path` resolves inside `root` once existing symlinks are followed.
///
/// The deepest existing ancestor is canonicalized; a dangling link counts as outside.
fn resolves_inside(root: &Path, path: &Path) -> bool {
    path.ancestors()
        .find(|p| fs::symlink_metadata(p).is_ok())
        .and_then(|p| fs::canonicalize(p).ok())
        .is_some_and(|p| p.starts_with(root))
}

/// Extract a `.tar.gz` into `dest`, removing each entry's top-level directory.
///
/// Hard links, symlinks pointing out of their directory and entries that
/// would land outside `dest` through an existing symlink are skipped.
/// Returns the number of entries written.
pub fn extract_stripped(archive: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    let root = fs::canonicalize(dest)?;

    let f = fs::File::open(archive)?;
    let gz = GzDecoder::new(f);
    let mut ar = tar::Archive::new(gz);

    let mut written = 0;
    for entry in ar.entries()? {
        let mut e = entry?;
        let Some(rel) = strip_root(&e.path()?) else {
            continue;
        };

        let kind = e.header().entry_type();
        if kind.is_hard_link() {
            warn!(path = %rel.display(), "skipping hard link");
            continue;
        }
        if kind.is_symlink() {
            let safe = e.link_name()?.is_some_and(|t| link_target_is_safe(&t));
            if !safe {
                warn!(path = %rel.display(), "skipping symlink leaving its directory");
                continue;
            }
        }

        let target = root.join(&rel);
        if !resolves_inside(&root, &target) {
            warn!(path = %rel.display(), "skipping entry outside the target directory");
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        e.unpack(&target)
            .with_context(|| format!("failed to extract {}", target.display()))?;
        written += 1;
    }
    Ok(written)
}
