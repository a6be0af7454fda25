use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use serde_json::{Number, Value};
use std::fs;

use super::{DatabaseAdapter, Row};
use crate::config::SqliteConfig;

/// File-backed (or `:memory:`) SQLite engine.
pub struct SqliteAdapter {
    conn: Mutex<Connection>,
}

impl SqliteAdapter {
    /// Open the database file, creating missing parent directories.
    pub fn open(cfg: &SqliteConfig) -> Result<Self> {
        let path = &cfg.filename;
        if path.as_os_str() == ":memory:" {
            return Self::in_memory();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database {}", path.display()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn query(&self, sql: &str, params: &[Value], limit: Option<usize>) -> Result<Vec<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql)))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Row::new();
            for (i, name) in names.iter().enumerate() {
                map.insert(name.clone(), from_sql(row.get_ref(i)?));
            }
            out.push(map);
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }
        }
        Ok(out)
    }
}

impl DatabaseAdapter for SqliteAdapter {
    fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query(sql, params, None)
    }

    fn first(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params, Some(1))?.into_iter().next())
    }

    fn exec(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

fn to_sql(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> SqliteAdapter {
        let db = SqliteAdapter::in_memory().unwrap();
        db.exec(
            "CREATE TABLE items(id INTEGER, title TEXT, score REAL, meta TEXT);
             INSERT INTO items VALUES(1, 'one', 1.5, NULL);
             INSERT INTO items VALUES(2, 'two', 2.5, '{\"a\":1}');",
        )
        .unwrap();
        db
    }

    #[test]
    fn all_returns_rows_as_maps() {
        let db = seeded();
        let rows = db.all("SELECT * FROM items ORDER BY id", &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&json!(1)));
        assert_eq!(rows[0].get("title"), Some(&json!("one")));
        assert_eq!(rows[0].get("score"), Some(&json!(1.5)));
        assert_eq!(rows[0].get("meta"), Some(&Value::Null));
    }

    #[test]
    fn first_binds_positional_params() {
        let db = seeded();
        let row = db
            .first("SELECT title FROM items WHERE id = ?", &[json!(2)])
            .unwrap()
            .unwrap();
        assert_eq!(row.get("title"), Some(&json!("two")));

        let none = db
            .first("SELECT title FROM items WHERE title = ?", &[json!("zzz")])
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn exec_reports_syntax_errors() {
        let db = SqliteAdapter::in_memory().unwrap();
        assert!(db.exec("broken sql ;;;").is_err());
    }

    #[test]
    fn open_creates_parent_directories() {
        let td = tempfile::tempdir().unwrap();
        let cfg = SqliteConfig {
            filename: td.path().join("a").join("b").join("c.sqlite"),
        };
        let db = SqliteAdapter::open(&cfg).unwrap();
        db.exec("CREATE TABLE t(v TEXT)").unwrap();
        assert!(cfg.filename.exists());
    }
}
