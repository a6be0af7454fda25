use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{DatabaseAdapter, Row};
use crate::api::http_client;

/// Hosted SQL engine reached over HTTP.
///
/// Every operation is a `POST {url}` with body `{"sql": ..., "params": [...]}`;
/// the engine answers `{"results": [rows]}`.
pub struct RemoteAdapter {
    client: Client,
    url: String,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Row>,
}

impl RemoteAdapter {
    pub fn new(url: &str, auth_token: Option<&str>, timeout: Duration) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(anyhow!("remote database url is empty"));
        }
        Ok(Self {
            client: http_client(timeout)?,
            url: url.to_string(),
            auth_token: auth_token.map(str::to_string),
        })
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        debug!(url = %self.url, "remote sql");
        let mut req = self
            .client
            .post(&self.url)
            .json(&json!({ "sql": sql, "params": params }));
        if let Some(tok) = &self.auth_token {
            req = req.bearer_auth(tok);
        }
        let resp = req.send().with_context(|| format!("POST {}", self.url))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("remote database error ({}): {}", status, body));
        }
        let parsed: QueryResponse = resp.json().context("invalid remote database response")?;
        Ok(parsed.results)
    }
}

impl DatabaseAdapter for RemoteAdapter {
    fn all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.run(sql, params)
    }

    fn first(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.run(sql, params)?.into_iter().next())
    }

    fn exec(&self, sql: &str) -> Result<()> {
        let _ = self.run(sql, &[])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn first_posts_sql_with_bearer_token() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/query")
                .header("authorization", "Bearer tok")
                .json_body(json!({ "sql": "SELECT v FROM t WHERE id = ?", "params": ["a"] }));
            then.status(200)
                .json_body(json!({ "results": [{ "v": "x" }, { "v": "y" }] }));
        });

        let db = RemoteAdapter::new(&server.url("/query"), Some("tok"), Duration::from_secs(5))
            .unwrap();
        let row = db
            .first("SELECT v FROM t WHERE id = ?", &[json!("a")])
            .unwrap()
            .unwrap();
        assert_eq!(row.get("v"), Some(&json!("x")));
        m.assert();
    }

    #[test]
    fn exec_surfaces_engine_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/query");
            then.status(400).body("near \"broken\": syntax error");
        });

        let db = RemoteAdapter::new(&server.url("/query"), None, Duration::from_secs(5)).unwrap();
        let err = db.exec("broken sql").unwrap_err();
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(RemoteAdapter::new(" ", None, Duration::from_secs(1)).is_err());
    }
}
