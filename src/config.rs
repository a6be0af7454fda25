use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::paths;

/// Top-level configuration loaded from `content.toml`.
///
/// Example TOML:
/// ```toml
/// base_url = "http://localhost:3000"
/// mode = "production"
/// replay = "best-effort"
///
/// [local_database]
/// filename = ".data/content/contents.sqlite"
///
/// [database]
/// type = "remote"
/// url = "https://db.example.com/query"
///
/// [checksums]
/// docs = "v3.5.0--abc123"
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub mode: RuntimeMode,
    #[serde(default = "default_info_table")]
    pub info_table: String,
    #[serde(default)]
    pub replay: ReplayStrategy,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub local_database: SqliteConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Collection name → expected dump checksum.
    #[serde(default)]
    pub checksums: HashMap<String, String>,
}

/// Where the application is running. Decides which database backend is used.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Development,
    Prerender,
    Production,
}

impl RuntimeMode {
    /// Development and prerender runs use the local SQLite database.
    pub fn uses_local_database(self) -> bool {
        matches!(self, RuntimeMode::Development | RuntimeMode::Prerender)
    }

    pub fn is_dev(self) -> bool {
        self == RuntimeMode::Development
    }
}

/// How a dump is replayed when one of its statements fails.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayStrategy {
    /// Log the failing statement, skip it and keep going.
    #[default]
    BestEffort,
    /// Stop at the first failing statement.
    FailFast,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    #[serde(default = "default_sqlite_filename")]
    pub filename: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            filename: default_sqlite_filename(),
        }
    }
}

/// Production database backend.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite(SqliteConfig),
    Remote {
        url: String,
        #[serde(default)]
        auth_token: Option<String>,
    },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig::Sqlite(SqliteConfig::default())
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            mode: RuntimeMode::default(),
            info_table: default_info_table(),
            replay: ReplayStrategy::default(),
            timeout_secs: default_timeout_secs(),
            local_database: SqliteConfig::default(),
            database: DatabaseConfig::default(),
            checksums: HashMap::new(),
        }
    }
}

impl ContentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn checksum(&self, collection: &str) -> Option<&str> {
        self.checksums.get(collection).map(String::as_str)
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_info_table() -> String {
    "_content_info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_sqlite_filename() -> PathBuf {
    PathBuf::from(".data/content/contents.sqlite")
}

/// Parse a configuration document.
pub fn parse_config(txt: &str) -> Result<ContentConfig> {
    toml::from_str(txt).context("failed to parse content.toml")
}

/// Load `content.toml` from an explicit path, or from [`paths()`] when `None`.
///
/// # Errors
/// - Returns an error if the file cannot be read; the message includes the path.
/// - Returns an error if parsing the TOML fails.
pub fn load_config(path: Option<&Path>) -> Result<ContentConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => paths()?.config,
    };
    let txt = fs::read_to_string(&path)
        .with_context(|| format!("config not found: {}", path.display()))?;
    parse_config(&txt)
}
