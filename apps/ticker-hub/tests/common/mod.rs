//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;

use ticker_hub::domain::protocol::Payload;
use ticker_hub::domain::snapshot::price_change;
use ticker_hub::{
    CryptoSnapshot, FetchError, InstrumentKey, InstrumentSearch, SearchResult, Snapshot,
    SnapshotFetcher, StockSnapshot,
};

/// Fetcher that serves whatever snapshots and search results the test has
/// set, and records how many fetches ran at once.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    snapshots: Mutex<HashMap<String, Snapshot>>,
    searches: Mutex<HashMap<String, Vec<SearchResult>>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn set(&self, key: &str, snapshot: Snapshot) {
        self.snapshots.lock().insert(key.to_string(), snapshot);
    }

    pub fn set_search(&self, query: &str, results: Vec<SearchResult>) {
        self.searches.lock().insert(query.to_string(), results);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch(&self, key: &InstrumentKey) -> Result<Snapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self
            .snapshots
            .lock()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(key.to_string()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl InstrumentSearch for ScriptedFetcher {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, FetchError> {
        self.searches
            .lock()
            .get(query)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(query.to_string()))
    }
}

pub fn stock(name: &str, price: &str) -> Snapshot {
    let price = Decimal::from_str(price).unwrap();
    let previous_close = Decimal::from_str("180.00").unwrap();
    let (change, change_percent) = price_change(price, previous_close);
    Snapshot::Stock(StockSnapshot {
        stock_name: name.to_string(),
        price,
        previous_close,
        change,
        change_percent,
        day_range: "$178.20 - $186.40".to_string(),
        year_range: "$138.80 - $299.29".to_string(),
        volume: "98.12M".to_string(),
        market_cap: "580.12B USD".to_string(),
        pe_ratio: None,
        primary_exchange: "NASDAQ".to_string(),
    })
}

pub fn crypto(price: &str) -> Snapshot {
    let price = Decimal::from_str(price).unwrap();
    let previous_close = Decimal::from_str("64000").unwrap();
    let (change, change_percent) = price_change(price, previous_close);
    Snapshot::Crypto(CryptoSnapshot {
        crypto_name: "Bitcoin (BTC / USD)".to_string(),
        description: "Bitcoin to United States Dollar".to_string(),
        price,
        previous_close,
        change,
        change_percent,
    })
}

pub fn key(raw: &str) -> InstrumentKey {
    InstrumentKey::parse(raw).unwrap()
}

/// Next queued message, decoded.
pub async fn next_json(rx: &mut mpsc::Receiver<Payload>) -> Value {
    let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("queue closed");
    serde_json::from_str(&payload).unwrap()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
