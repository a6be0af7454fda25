use anyhow::{Result, bail};
use indicatif::MultiProgress;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::api::ContentApi;
use crate::config::{ContentConfig, load_config};
use crate::database::{AdapterLoader, DatabaseAdapter};
use crate::integrity::{IntegrityChecker, IntegrityState};
use crate::progress::{finish, spinner};

/// Everything a request handler needs, built once at startup.
///
/// The adapter is opened eagerly so backend failures surface here rather
/// than on the first query.
pub struct Content {
    pub config: ContentConfig,
    pub db: Arc<AdapterLoader>,
    pub api: Arc<ContentApi>,
    pub checker: IntegrityChecker,
}

impl Content {
    pub fn open(config: ContentConfig) -> Result<Self> {
        let db = Arc::new(AdapterLoader::connect(&config)?);
        let api = Arc::new(ContentApi::new(&config)?);
        let checker = IntegrityChecker::from_config(&config, db.clone(), api.clone());
        Ok(Self {
            config,
            db,
            api,
            checker,
        })
    }

    /// Collections named in the manifest, sorted.
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.config.checksums.keys().cloned().collect();
        names.sort();
        names
    }
}

/// CLI command: verify and (re)import collections.
///
/// With no names, every manifest collection is checked. Collections are
/// checked in parallel, each with its own spinner; a collection that ends
/// invalid does not stop the others.
///
/// # Errors
/// - Config or adapter initialization failures.
/// - At least one collection ended invalid.
pub fn cmd_import(config_path: Option<&Path>, collections: Vec<String>) -> Result<()> {
    let content = Content::open(load_config(config_path)?)?;
    let names = if collections.is_empty() {
        content.collections()
    } else {
        collections
    };
    if names.is_empty() {
        eprintln!("no collections in manifest");
        return Ok(());
    }

    let mp = MultiProgress::new();
    let bars: Vec<_> = names
        .iter()
        .map(|n| spinner(Some(&mp), format!("checking {}", n)))
        .collect();

    let failed = names
        .par_iter()
        .enumerate()
        .filter(|(idx, name)| {
            let state = content.checker.check_and_import(name);
            let ok = state == IntegrityState::Valid;
            let msg = if ok {
                format!("{} is up to date", name)
            } else {
                format!("{} is invalid", name)
            };
            finish(&bars[*idx], ok, msg);
            !ok
        })
        .count();

    if failed > 0 {
        bail!("{} of {} collections failed the integrity check", failed, names.len());
    }
    Ok(())
}

/// CLI command: run `sql` against a collection and print the rows as JSON.
///
/// Locally the collection is checked (and imported if needed) first; with
/// `remote` the server-side query endpoint is used instead.
pub fn cmd_query(config_path: Option<&Path>, collection: &str, sql: &str, remote: bool) -> Result<()> {
    let cfg = load_config(config_path)?;
    if remote {
        let api = ContentApi::new(&cfg)?;
        let value = api.fetch_query(collection, sql)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let content = Content::open(cfg)?;
    let state = content.checker.check_and_import(collection);
    info!(collection, ?state, "integrity checked before query");
    let rows = content.db.all(sql, &[])?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
