//! Archive snapshot transport.
//!
//! An archive is one compressed snapshot holding every registry's document
//! for an indexing run: a gzip-compressed JSON object mapping the registry's
//! raw identifier to its document. Plain JSON bodies are accepted when the
//! gzip magic bytes are absent.

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::Client;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::errors::{CatalogError, Result};

const DEFAULT_MAX_RETRIES: u32 = 3;

/// A fetched snapshot: raw registry identifier to unparsed document.
///
/// Documents stay as raw JSON values here so a malformed registry is a
/// per-registry parse error during the run, not a terminal fetch error.
#[derive(Debug, Clone)]
pub struct ArchiveSnapshot {
    pub registries: BTreeMap<String, Value>,
}

impl ArchiveSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

/// Source of archive snapshots, implemented by the HTTP client and by test
/// mocks.
pub trait ArchiveProvider {
    fn fetch_snapshot(
        &self,
        url_override: Option<&str>,
        timeout: Option<u64>,
    ) -> impl std::future::Future<Output = Result<ArchiveSnapshot>> + Send;
}

/// HTTP archive client with retrying fetch.
#[derive(Debug)]
pub struct HttpArchiveClient {
    client: Client,
    archive_url: String,
    max_retries: u32,
}

impl HttpArchiveClient {
    #[must_use]
    pub fn new(archive_url: impl Into<String>, max_retries: u32) -> Self {
        Self {
            client: Client::new(),
            archive_url: archive_url.into(),
            max_retries,
        }
    }

    #[must_use]
    pub fn with_default_retries(archive_url: impl Into<String>) -> Self {
        Self::new(archive_url, DEFAULT_MAX_RETRIES)
    }

    async fn fetch_once(&self, url: &str, timeout: Option<u64>) -> Result<ArchiveSnapshot> {
        let request = self.client.get(url);
        let request = match timeout {
            Some(seconds) => request.timeout(Duration::from_secs(seconds)),
            None => request,
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::archive_unreachable(format!(
                "Archive responded with status {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        decode_snapshot(&body)
    }
}

impl ArchiveProvider for HttpArchiveClient {
    async fn fetch_snapshot(
        &self,
        url_override: Option<&str>,
        timeout: Option<u64>,
    ) -> Result<ArchiveSnapshot> {
        let url = url_override.unwrap_or(&self.archive_url);

        let mut attempts = 0;
        loop {
            match self.fetch_once(url, timeout).await {
                Ok(snapshot) => return Ok(snapshot),
                // Malformed payloads will not get better on retry.
                Err(e @ CatalogError::ArchiveMalformed { .. }) => return Err(e),
                Err(e) => {
                    attempts += 1;
                    if attempts > self.max_retries {
                        error!("[archive] Fetch failed after {} attempts: {}", attempts, e);
                        return Err(e);
                    }
                    let backoff = Duration::from_secs(2_u64.pow(attempts));
                    warn!(
                        "[archive] Fetch failed: {}. Retrying in {:?} (attempt {}/{})",
                        e, backoff, attempts, self.max_retries
                    );
                    sleep(backoff).await;
                }
            }
        }
    }
}

/// Decodes a snapshot body, transparently inflating gzip.
pub fn decode_snapshot(body: &[u8]) -> Result<ArchiveSnapshot> {
    let json_bytes = if body.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(body);
        let mut inflated = Vec::new();
        decoder.read_to_end(&mut inflated).map_err(|e| {
            CatalogError::archive_malformed(format!("Failed to decompress archive: {e}"))
        })?;
        inflated
    } else {
        body.to_vec()
    };

    let registries: BTreeMap<String, Value> = serde_json::from_slice(&json_bytes)
        .map_err(|e| CatalogError::archive_malformed(format!("Invalid snapshot JSON: {e}")))?;

    Ok(ArchiveSnapshot { registries })
}
