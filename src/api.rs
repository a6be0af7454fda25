//! HTTP client for the content module's server endpoints.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::{ContentConfig, RuntimeMode};

/// Something that can hand out the compressed dump of a collection.
///
/// Implementations never fail: an unavailable dump is reported as an empty
/// string, which decodes to an empty statement list.
pub trait DumpSource: Send + Sync {
    fn fetch(&self, collection: &str, version: &str) -> String;
}

/// Blocking client for `/api/content/{collection}/...`.
pub struct ContentApi {
    client: Client,
    base_url: String,
    mode: RuntimeMode,
    checksums: HashMap<String, String>,
}

/// Build the shared HTTP client with default headers and a request timeout.
pub fn http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("content-sync"));
    let client = Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

impl ContentApi {
    pub fn new(cfg: &ContentConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(cfg.timeout())?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            mode: cfg.mode,
            checksums: cfg.checksums.clone(),
        })
    }

    fn endpoint(&self, collection: &str, tail: &str) -> String {
        format!("{}/api/content/{}/{}", self.base_url, collection, tail)
    }

    /// `v` carries the checksum; `t` busts caches in development only.
    fn query_params(&self, version: &str) -> Vec<(&'static str, String)> {
        let mut q = vec![("v", version.to_string())];
        if self.mode.is_dev() {
            q.push(("t", chrono::Utc::now().timestamp_millis().to_string()));
        }
        q
    }

    fn manifest_version(&self, collection: &str) -> &str {
        self.checksums
            .get(collection)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Download the compressed dump of `collection`, tagged with its manifest checksum.
    pub fn fetch_database(&self, collection: &str) -> Result<String> {
        self.fetch_database_version(collection, self.manifest_version(collection))
    }

    /// Download the compressed dump of `collection` for an explicit checksum.
    ///
    /// # Errors
    /// Returns an error on network failure or a non-2xx status.
    pub fn fetch_database_version(&self, collection: &str, version: &str) -> Result<String> {
        let url = self.endpoint(collection, "database.sql");
        debug!(%url, collection, version, "fetching dump");
        let text = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "text/plain")
            .query(&self.query_params(version))
            .send()
            .with_context(|| format!("GET {}", url))?
            .error_for_status()?
            .text()?;
        Ok(text)
    }

    /// Run `sql` through the server-side query endpoint of `collection`.
    pub fn fetch_query(&self, collection: &str, sql: &str) -> Result<Value> {
        let url = self.endpoint(collection, "query");
        let resp = self
            .client
            .post(&url)
            .query(&self.query_params(self.manifest_version(collection)))
            .json(&json!({ "sql": sql }))
            .send()
            .with_context(|| format!("POST {}", url))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("query on {} failed ({}): {}", collection, status, body));
        }
        resp.json().context("query response is not JSON")
    }
}

impl DumpSource for ContentApi {
    fn fetch(&self, collection: &str, version: &str) -> String {
        match self.fetch_database_version(collection, version) {
            Ok(text) => text,
            Err(e) => {
                error!(collection, error = %format!("{:#}", e), "failed to fetch compressed dump");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn api_for(server: &MockServer, mode: RuntimeMode) -> ContentApi {
        let mut cfg = ContentConfig {
            base_url: server.base_url(),
            mode,
            ..ContentConfig::default()
        };
        cfg.checksums.insert("docs".into(), "v1".into());
        ContentApi::new(&cfg).unwrap()
    }

    #[test]
    fn fetch_database_sends_checksum_and_dev_timestamp() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/api/content/docs/database.sql")
                .query_param("v", "v1")
                .query_param_exists("t");
            then.status(200).body("payload");
        });

        let api = api_for(&server, RuntimeMode::Development);
        assert_eq!(api.fetch_database("docs").unwrap(), "payload");
        m.assert();
    }

    #[test]
    fn production_omits_timestamp() {
        let server = MockServer::start();
        let stamped = server.mock(|when, then| {
            when.method(GET)
                .path("/api/content/docs/database.sql")
                .query_param_exists("t");
            then.status(500);
        });
        let plain = server.mock(|when, then| {
            when.method(GET)
                .path("/api/content/docs/database.sql")
                .query_param("v", "v1");
            then.status(200).body("payload");
        });

        let api = api_for(&server, RuntimeMode::Production);
        assert_eq!(api.fetch_database("docs").unwrap(), "payload");
        assert_eq!(stamped.hits(), 0);
        plain.assert();
    }

    #[test]
    fn dump_source_swallows_http_errors() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/api/content/docs/database.sql");
            then.status(500).body("boom");
        });

        let api = api_for(&server, RuntimeMode::Production);
        assert!(api.fetch_database("docs").is_err());
        assert_eq!(DumpSource::fetch(&api, "docs", "v1"), "");
        assert_eq!(m.hits(), 2);
    }

    #[test]
    fn fetch_query_posts_sql_body() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/api/content/docs/query")
                .query_param("v", "v1")
                .json_body(json!({ "sql": "SELECT 1" }));
            then.status(200).json_body(json!([{ "1": 1 }]));
        });

        let api = api_for(&server, RuntimeMode::Production);
        let got = api.fetch_query("docs", "SELECT 1").unwrap();
        assert_eq!(got, json!([{ "1": 1 }]));
        m.assert();
    }

    #[test]
    fn fetch_query_surfaces_server_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/content/docs/query");
            then.status(400).body("bad sql");
        });

        let api = api_for(&server, RuntimeMode::Production);
        let err = api.fetch_query("docs", "nope").unwrap_err();
        assert!(err.to_string().contains("bad sql"));
    }
}
