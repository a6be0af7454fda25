use anyhow::Result;
use std::{env, path::PathBuf};

/// Locations of the content-sync home directory and its config file.
#[derive(Clone)]
pub struct Paths {
    pub home: PathBuf,
    pub config: PathBuf,
}

/// Names joined onto the directory passed to [`crate::git::download_repository`].
pub const CLONE_TARBALL: &str = ".content.clone.tar.gz";
pub const CACHE_FILE: &str = ".content.cache.json";

/// Resolve the content-sync home directory.
///
/// `$XDG_CONFIG_HOME/content-sync`, falling back to `$HOME/.config/content-sync`.
pub fn content_home() -> Result<PathBuf> {
    let xdg = env::var_os("XDG_CONFIG_HOME");
    let base = xdg
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env::var_os("HOME").unwrap_or_default()).join(".config"));
    Ok(base.join("content-sync"))
}

/// Resolve all paths; `CONTENT_SYNC_CONFIG` overrides the config file location.
pub fn paths() -> Result<Paths> {
    let home = content_home()?;
    let config = env::var_os("CONTENT_SYNC_CONFIG")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join("content.toml"));
    Ok(Paths { home, config })
}
