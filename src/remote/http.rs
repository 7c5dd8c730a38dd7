//! HTTP implementation of [`RemoteClient`].

use super::{PushPayload, RemoteClient, RemoteRecord};
use crate::config::RemoteConfig;
use crate::constants::remote::{FETCH_PATH, PUSH_PATH};
use crate::error::{Error, Result};
use crate::store::DetectionRecord;
use reqwest::Client;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Blocking client for the detection server.
///
/// Owns a single-threaded runtime so callers stay synchronous. Every request
/// is bounded by the configured connect and request timeouts, so a dead link
/// costs at most one timeout per call.
pub struct HttpRemote {
    client: Client,
    runtime: Runtime,
    fetch_url: String,
    push_url: String,
}

impl HttpRemote {
    /// Build a client from remote settings.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
            .map_err(|source| Error::HttpClientBuild { source })?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            runtime,
            fetch_url: format!("{base}/{FETCH_PATH}"),
            push_url: format!("{base}/{PUSH_PATH}"),
        })
    }

    /// URL used by [`RemoteClient::fetch_all`].
    pub fn fetch_url(&self) -> &str {
        &self.fetch_url
    }

    /// URL used by [`RemoteClient::push`].
    pub fn push_url(&self) -> &str {
        &self.push_url
    }
}

impl RemoteClient for HttpRemote {
    fn fetch_all(&self) -> Result<Vec<RemoteRecord>> {
        let url = &self.fetch_url;
        let body = self.runtime.block_on(async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::network(url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::network(url, format!("HTTP {status}")));
            }

            response.bytes().await.map_err(|e| Error::network(url, e))
        })?;

        let records = parse_snapshot(&body).map_err(|e| Error::network(url, e))?;
        debug!("Fetched {} records from {url}", records.len());
        Ok(records)
    }

    fn push(&self, record: &DetectionRecord) -> Result<()> {
        let url = &self.push_url;
        let body = serde_json::to_vec(&PushPayload::from(record)).map_err(|e| Error::Internal {
            message: format!("failed to encode push payload: {e}"),
        })?;

        self.runtime.block_on(async {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| Error::network(url, e))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(Error::network(url, format!("HTTP {status}")))
            }
        })
    }
}

/// Decode a `get_all_data` response body.
///
/// The body must be a JSON array. Elements that are not records are
/// skipped with a warning rather than failing the whole snapshot.
pub fn parse_snapshot(body: &[u8]) -> std::result::Result<Vec<RemoteRecord>, String> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {e}"))?;

    let serde_json::Value::Array(items) = value else {
        return Err("expected a JSON array".to_string());
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RemoteRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping malformed remote entry #{index}: {e}"),
        }
    }
    Ok(records)
}
