//! Google Finance quote page fetcher.
//!
//! The same pages serve snapshots and search: a quote page for a partial
//! or ambiguous query links to every instrument it matches.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};

use super::parse;
use crate::application::ports::{FetchError, InstrumentSearch, SnapshotFetcher};
use crate::domain::instrument::{InstrumentKey, InstrumentKind};
use crate::domain::search::SearchResult;
use crate::domain::snapshot::Snapshot;
use crate::infrastructure::config::FetcherSettings;

/// Snapshot source backed by public quote pages.
///
/// Implements `SnapshotFetcher` and `InstrumentSearch`. One shared HTTP client serves every
/// concurrent fetch.
#[derive(Debug, Clone)]
pub struct GoogleFinanceFetcher {
    client: Client,
    base_url: String,
}

impl GoogleFinanceFetcher {
    /// Create a fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the HTTP client cannot be built.
    pub fn new(settings: &FetcherSettings, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_page(&self, path: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(format!("{}/quote/{}", self.base_url, path))
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(path.to_string())),
            status if !status.is_success() => {
                return Err(FetchError::Status {
                    key: path.to_string(),
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

#[async_trait]
impl SnapshotFetcher for GoogleFinanceFetcher {
    async fn fetch(&self, key: &InstrumentKey) -> Result<Snapshot, FetchError> {
        let kind = key.kind();
        if kind == InstrumentKind::Crypto && key.crypto_pair().is_none() {
            return Err(FetchError::NotFound(key.to_string()));
        }

        let html = self.fetch_page(key.as_str()).await?;
        let snapshot = match kind {
            InstrumentKind::Equity => parse::stock_snapshot(key, &html),
            InstrumentKind::Crypto => parse::crypto_snapshot(key, &html),
        }?;

        tracing::trace!(ticker = %key, price = %snapshot.price(), "Fetched snapshot");
        Ok(snapshot)
    }
}

#[async_trait]
impl InstrumentSearch for GoogleFinanceFetcher {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, FetchError> {
        let html = self.fetch_page(query.trim()).await?;
        let results = parse::search_results(&html);
        tracing::trace!(query, results = results.len(), "Search complete");
        Ok(results)
    }
}
