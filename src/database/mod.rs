//! Database adapter layer.
//!
//! [`DatabaseAdapter`] is the storage seam the integrity checker talks to.
//! [`AdapterLoader`] picks the backend for the current
//! [`RuntimeMode`](crate::config::RuntimeMode) and
//! holds exactly one adapter instance for the life of the loader.

mod remote;
mod sqlite;

use anyhow::{Result, bail};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{ContentConfig, DatabaseConfig, SqliteConfig};

pub use remote::RemoteAdapter;
pub use sqlite::SqliteAdapter;

/// One result row: column name → value.
pub type Row = Map<String, Value>;

/// Query/execute operations over SQL text with positional parameters.
pub trait DatabaseAdapter: Send + Sync {
    /// Every row produced by `sql`.
    fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// The first row produced by `sql`, if any.
    fn first(&self, sql: &str, params: &[Value]) -> Result<Option<Row>>;

    /// Run `sql` for its side effects.
    fn exec(&self, sql: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
enum Backend {
    Sqlite(SqliteConfig),
    Remote {
        url: String,
        auth_token: Option<String>,
        timeout: Duration,
    },
    Injected,
}

impl Backend {
    fn open(&self) -> Result<Arc<dyn DatabaseAdapter>> {
        match self {
            Backend::Sqlite(cfg) => Ok(Arc::new(SqliteAdapter::open(cfg)?)),
            Backend::Remote {
                url,
                auth_token,
                timeout,
            } => Ok(Arc::new(RemoteAdapter::new(
                url,
                auth_token.as_deref(),
                *timeout,
            )?)),
            Backend::Injected => bail!("injected adapter is missing"),
        }
    }
}

/// Init-once holder of the database adapter.
///
/// The backend is resolved from the runtime mode when the loader is built
/// and never re-evaluated. The adapter itself is opened by [`AdapterLoader::connect`]
/// at startup, or on the first [`AdapterLoader::adapter`] call. A failed open
/// is not cached; the next call tries again.
pub struct AdapterLoader {
    backend: Backend,
    slot: Mutex<Option<Arc<dyn DatabaseAdapter>>>,
}

impl AdapterLoader {
    /// Resolve the backend without opening it.
    ///
    /// Development and prerender modes use `local_database`; production uses `database`.
    pub fn new(cfg: &ContentConfig) -> Self {
        let backend = if cfg.mode.uses_local_database() {
            Backend::Sqlite(cfg.local_database.clone())
        } else {
            match &cfg.database {
                DatabaseConfig::Sqlite(s) => Backend::Sqlite(s.clone()),
                DatabaseConfig::Remote { url, auth_token } => Backend::Remote {
                    url: url.clone(),
                    auth_token: auth_token.clone(),
                    timeout: cfg.timeout(),
                },
            }
        };
        Self {
            backend,
            slot: Mutex::new(None),
        }
    }

    /// Resolve the backend and open it immediately.
    ///
    /// # Errors
    /// Returns the backend's initialization error.
    pub fn connect(cfg: &ContentConfig) -> Result<Self> {
        let loader = Self::new(cfg);
        let _ = loader.adapter()?;
        info!(backend = loader.backend_name(), mode = ?cfg.mode, "database adapter ready");
        Ok(loader)
    }

    /// Wrap an already constructed adapter.
    pub fn with_adapter(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self {
            backend: Backend::Injected,
            slot: Mutex::new(Some(adapter)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Sqlite(_) => "sqlite",
            Backend::Remote { .. } => "remote",
            Backend::Injected => "injected",
        }
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// The shared adapter, opening it on first use.
    pub fn adapter(&self) -> Result<Arc<dyn DatabaseAdapter>> {
        let mut slot = self.slot.lock();
        if let Some(adapter) = slot.as_ref() {
            return Ok(Arc::clone(adapter));
        }
        let adapter = self.backend.open()?;
        *slot = Some(Arc::clone(&adapter));
        Ok(adapter)
    }
}

impl DatabaseAdapter for AdapterLoader {
    fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.adapter()?.all(sql, params)
    }

    fn first(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        self.adapter()?.first(sql, params)
    }

    fn exec(&self, sql: &str) -> Result<()> {
        self.adapter()?.exec(sql)
    }
}
