//! Per-collection integrity check and dump import.
//!
//! Each collection owns one lockable entry. A caller holds its collection's
//! entry for the whole check cycle, so concurrent callers for the same
//! collection wait for that cycle and then see its result, while other
//! collections proceed independently.

mod replay;

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::DumpSource;
use crate::config::{ContentConfig, ReplayStrategy};
use crate::database::DatabaseAdapter;
use crate::dump::decompress_sql_dump;

pub use replay::{ReplayReport, replay_dump};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityState {
    /// Not checked yet in this process.
    Unknown,
    /// A check cycle is running.
    Checking,
    /// The stored version marker matched the expected checksum.
    Valid,
    /// The last cycle failed or ended with a mismatching marker; the next call retries.
    Invalid,
}

/// One collection's slot.
///
/// `cycle` is held for a whole check cycle and stores the checksum the last
/// cycle ran against. `state` is only locked for reads and writes of the
/// published state, so [`IntegrityChecker::state`] never waits on a cycle.
#[derive(Debug)]
struct Entry {
    state: Mutex<IntegrityState>,
    cycle: Mutex<String>,
}

impl Entry {
    fn publish(&self, state: IntegrityState) {
        *self.state.lock() = state;
    }
}

/// Decides whether a collection's dump must be (re)imported, and imports it.
pub struct IntegrityChecker {
    db: Arc<dyn DatabaseAdapter>,
    source: Arc<dyn DumpSource>,
    checksums: HashMap<String, String>,
    info_table: String,
    strategy: ReplayStrategy,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

impl IntegrityChecker {
    pub fn new(
        db: Arc<dyn DatabaseAdapter>,
        source: Arc<dyn DumpSource>,
        checksums: HashMap<String, String>,
    ) -> Self {
        Self {
            db,
            source,
            checksums,
            info_table: "_content_info".to_string(),
            strategy: ReplayStrategy::default(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Manifest, info table and replay strategy taken from `cfg`.
    pub fn from_config(
        cfg: &ContentConfig,
        db: Arc<dyn DatabaseAdapter>,
        source: Arc<dyn DumpSource>,
    ) -> Self {
        Self::new(db, source, cfg.checksums.clone())
            .with_info_table(&cfg.info_table)
            .with_strategy(cfg.replay)
    }

    pub fn with_info_table(mut self, table: &str) -> Self {
        self.info_table = table.to_string();
        self
    }

    pub fn with_strategy(mut self, strategy: ReplayStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn entry(&self, collection: &str) -> Arc<Entry> {
        let mut entries = self.entries.lock();
        Arc::clone(entries.entry(collection.to_string()).or_insert_with(|| {
            Arc::new(Entry {
                state: Mutex::new(IntegrityState::Unknown),
                cycle: Mutex::new(String::new()),
            })
        }))
    }

    /// Current state of `collection` without waiting for a running cycle.
    pub fn state(&self, collection: &str) -> IntegrityState {
        match self.entries.lock().get(collection) {
            Some(e) => *e.state.lock(),
            None => IntegrityState::Unknown,
        }
    }

    /// Forget a previous result so the next call checks again.
    ///
    /// Waits for a running cycle of `collection` to finish first.
    pub fn invalidate(&self, collection: &str) {
        let entry = self.entry(collection);
        let _cycle = entry.cycle.lock();
        entry.publish(IntegrityState::Unknown);
    }

    /// Check `collection` against its manifest checksum, importing on mismatch.
    ///
    /// Never fails; errors are logged and reported as [`IntegrityState::Invalid`].
    pub fn check_and_import(&self, collection: &str) -> IntegrityState {
        match self.checksums.get(collection) {
            Some(expected) => self.check_and_import_version(collection, expected),
            None => {
                warn!(collection, "no checksum in manifest");
                IntegrityState::Invalid
            }
        }
    }

    /// Check `collection` against an explicit checksum, importing on mismatch.
    pub fn check_and_import_version(&self, collection: &str, expected: &str) -> IntegrityState {
        let entry = self.entry(collection);
        let mut verified = entry.cycle.lock();
        if *entry.state.lock() == IntegrityState::Valid && *verified == expected {
            debug!(collection, version = expected, "integrity already verified");
            return IntegrityState::Valid;
        }

        entry.publish(IntegrityState::Checking);
        let state = match self.run_cycle(collection, expected) {
            Ok(true) => IntegrityState::Valid,
            Ok(false) => {
                warn!(collection, version = expected, "version marker mismatch after import");
                IntegrityState::Invalid
            }
            Err(e) => {
                error!(collection, error = %format!("{:#}", e), "database integrity check failed");
                IntegrityState::Invalid
            }
        };
        *verified = expected.to_string();
        entry.publish(state);
        state
    }

    fn marker_id(collection: &str) -> String {
        format!("checksum_{}", collection)
    }

    /// Stored version for `collection`; a failed read counts as no marker.
    pub fn stored_version(&self, collection: &str) -> Option<String> {
        let sql = format!("SELECT version FROM {} WHERE id = ?", self.info_table);
        self.db
            .first(&sql, &[json!(Self::marker_id(collection))])
            .ok()
            .flatten()
            .and_then(|row| row.get("version").and_then(|v| v.as_str()).map(str::to_string))
            .filter(|v| !v.is_empty())
    }

    fn run_cycle(&self, collection: &str, expected: &str) -> Result<bool> {
        if let Some(before) = self.stored_version(collection) {
            if before == expected {
                return Ok(true);
            }
            debug!(collection, stale = %before, "removing stale version marker");
            self.db.exec(&format!(
                "DELETE FROM {} WHERE id = '{}'",
                self.info_table,
                Self::marker_id(collection).replace('\'', "''")
            ))?;
        }

        let payload = self.source.fetch(collection, expected);
        let statements = decompress_sql_dump(&payload)?;
        let report = replay_dump(self.db.as_ref(), &statements, self.strategy)?;
        info!(
            collection,
            version = expected,
            applied = report.applied,
            failed = report.failed,
            "dump replayed"
        );

        Ok(self.stored_version(collection).as_deref() == Some(expected))
    }
}
