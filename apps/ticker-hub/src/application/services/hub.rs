//! Subscription Hub
//!
//! The single authority over the instrument store and the subscription
//! index. Subscribe, unsubscribe and refresh are invoked directly from the
//! task that needs them and synchronize through one reader/writer lock;
//! client registration and the poll timer are serialized by the
//! coordinating loop in [`super::coordinator`].
//!
//! # Locking
//!
//! `state` is a `parking_lot::RwLock` and is never held across `.await`.
//! A refresh fetches without the lock, then takes the write lock to
//! compare, apply and enqueue in one critical section, so per-key updates
//! are linearized and reach every subscriber in store order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinSet;

use super::client::{ClientHandle, Delivery};
use super::gate::{GateError, WorkerPoolGate};
use crate::application::ports::{FetchError, SnapshotFetcher};
use crate::domain::instrument::{InstrumentKey, InstrumentKind};
use crate::domain::protocol::{Payload, ServerMessage};
use crate::domain::snapshot::{Snapshot, StoreEntry};
use crate::domain::subscription::{ClientId, SubscriptionIndex};
use crate::infrastructure::metrics;

// =============================================================================
// Configuration
// =============================================================================

/// Hub tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Period between poll cycles.
    pub poll_interval: Duration,
    /// Worker Pool Gate width.
    pub workers: usize,
    /// Upper bound on a single fetch.
    pub fetch_timeout: Duration,
    /// Per-client outbound queue capacity.
    pub client_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            workers: 10,
            fetch_timeout: Duration::from_secs(15),
            client_queue_capacity: 256,
        }
    }
}

// =============================================================================
// Outcomes & Stats
// =============================================================================

/// What a single refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
    /// Snapshot changed and was broadcast.
    Updated,
    /// Snapshot was structurally equal to the stored one.
    Unchanged,
    /// Fetcher produced no data.
    NoData,
    /// Key was evicted while the fetch was in flight; result discarded.
    Untracked,
    /// Fetch exceeded the timeout.
    TimedOut,
}

impl RefreshOutcome {
    /// Metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::NoData => "no_data",
            Self::Untracked => "untracked",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Instruments refreshed.
    pub refreshed: usize,
    /// Refreshes that changed data.
    pub updated: usize,
    /// Refreshes that produced no data or timed out.
    pub missed: usize,
}

/// Point-in-time hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    /// Registered clients.
    pub clients: usize,
    /// Store entries.
    pub tracked_instruments: usize,
    /// (client, key) subscription pairs.
    pub subscriptions: usize,
    /// Completed poll cycles.
    pub poll_cycles: u64,
    /// When the last poll cycle finished.
    pub last_poll_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Hub
// =============================================================================

#[derive(Debug, Default)]
struct HubState {
    store: HashMap<InstrumentKey, StoreEntry>,
    subscriptions: SubscriptionIndex,
    clients: HashMap<ClientId, Arc<ClientHandle>>,
}

impl HubState {
    /// Enqueue an update for `key` to every current subscriber.
    fn broadcast(
        &self,
        key: &InstrumentKey,
        snapshot: &Snapshot,
        updated_at: DateTime<Utc>,
    ) -> usize {
        let message = ServerMessage::update(key, snapshot.clone(), updated_at);
        let Some(payload) = encode(&message) else {
            return 0;
        };

        self.subscriptions
            .subscribers(key)
            .filter_map(|id| self.clients.get(&id))
            .filter(|client| client.try_send(Arc::clone(&payload), message.kind) == Delivery::Queued)
            .count()
    }

    fn publish_gauges(&self) {
        metrics::set_clients(self.clients.len());
        metrics::set_tracked_instruments(self.store.len());
    }
}

/// Demand-driven subscription hub.
pub struct Hub {
    state: RwLock<HubState>,
    fetcher: Arc<dyn SnapshotFetcher>,
    gate: WorkerPoolGate,
    config: HubConfig,
    poll_cycles: AtomicU64,
    last_poll_at: Mutex<Option<DateTime<Utc>>>,
    running: AtomicBool,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Create a hub over a snapshot source.
    #[must_use]
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>, config: HubConfig) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(HubState::default()),
            fetcher,
            gate: WorkerPoolGate::new(config.workers, config.fetch_timeout),
            config,
            poll_cycles: AtomicU64::new(0),
            last_poll_at: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Hub tuning.
    #[must_use]
    pub const fn config(&self) -> &HubConfig {
        &self.config
    }

    /// The shared fetch gate.
    #[must_use]
    pub const fn gate(&self) -> &WorkerPoolGate {
        &self.gate
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Add a client to the connected set.
    pub fn register_client(&self, client: Arc<ClientHandle>) {
        let mut state = self.state.write();
        let id = client.id();
        state.clients.insert(id, client);
        state.publish_gauges();
        tracing::debug!(client_id = %id, clients = state.clients.len(), "Client registered");
    }

    /// Remove a client, evicting every instrument it was the last subscriber
    /// of, and close its queue.
    ///
    /// Returns `false` if the client was not registered.
    pub fn unregister_client(&self, id: ClientId) -> bool {
        let mut state = self.state.write();
        let Some(client) = state.clients.remove(&id) else {
            return false;
        };

        let evicted = state.subscriptions.remove_client(id);
        for key in &evicted {
            state.store.remove(key);
        }
        client.close();
        state.publish_gauges();

        tracing::debug!(
            client_id = %id,
            evicted = evicted.len(),
            clients = state.clients.len(),
            "Client unregistered"
        );
        true
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe a client to a raw key.
    ///
    /// Empty keys and unknown clients are ignored. The acknowledgment, and
    /// the cached snapshot if one exists, are enqueued before an immediate
    /// refresh is scheduled.
    pub fn subscribe(self: &Arc<Self>, id: ClientId, raw: &str) {
        let Ok(key) = InstrumentKey::parse(raw) else {
            tracing::debug!(client_id = %id, "Ignoring subscribe with empty ticker");
            return;
        };

        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let Some(client) = state.clients.get(&id) else {
                tracing::debug!(client_id = %id, ticker = %key, "Ignoring subscribe from unknown client");
                return;
            };

            let first = state.subscriptions.add(id, &key);
            let entry = state
                .store
                .entry(key.clone())
                .or_insert_with(|| StoreEntry::new(key.clone()));

            client.send(&ServerMessage::subscribed(&key));
            if let (Some(snapshot), Some(updated_at)) = (&entry.snapshot, entry.last_updated) {
                client.send(&ServerMessage::update(&key, snapshot.clone(), updated_at));
            }
            state.publish_gauges();

            tracing::info!(client_id = %id, ticker = %key, first_subscriber = first, "Subscribed");
        }

        self.spawn_refresh(key);
    }

    /// Unsubscribe a client from a raw key.
    ///
    /// The entry is evicted when its last subscriber leaves. The client is
    /// acknowledged whether or not it was subscribed.
    pub fn unsubscribe(&self, id: ClientId, raw: &str) {
        let Ok(key) = InstrumentKey::parse(raw) else {
            tracing::debug!(client_id = %id, "Ignoring unsubscribe with empty ticker");
            return;
        };

        let mut guard = self.state.write();
        let state = &mut *guard;
        let Some(client) = state.clients.get(&id) else {
            return;
        };

        if state.subscriptions.remove(id, &key) {
            state.store.remove(&key);
            tracing::info!(ticker = %key, "Evicted instrument with no subscribers");
        }
        client.send(&ServerMessage::unsubscribed(&key));
        state.publish_gauges();

        tracing::info!(client_id = %id, ticker = %key, "Unsubscribed");
    }

    // =========================================================================
    // Polling
    // =========================================================================

    fn spawn_refresh(self: &Arc<Self>, key: InstrumentKey) {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            hub.refresh_one(&key).await;
        });
    }

    /// Refresh every tracked instrument through the gate and wait for all
    /// of them.
    pub async fn poll_cycle(self: &Arc<Self>) -> PollSummary {
        let keys: Vec<InstrumentKey> = self.state.read().store.keys().cloned().collect();
        let started = Instant::now();

        let mut tasks = JoinSet::new();
        for key in keys {
            let hub = Arc::clone(self);
            tasks.spawn(async move { hub.refresh_one(&key).await });
        }

        let mut summary = PollSummary::default();
        while let Some(joined) = tasks.join_next().await {
            summary.refreshed += 1;
            match joined {
                Ok(RefreshOutcome::Updated) => summary.updated += 1,
                Ok(RefreshOutcome::NoData | RefreshOutcome::TimedOut) => summary.missed += 1,
                Ok(RefreshOutcome::Unchanged | RefreshOutcome::Untracked) => {}
                Err(e) => {
                    summary.missed += 1;
                    tracing::error!(error = %e, "Refresh task failed");
                }
            }
        }

        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
        *self.last_poll_at.lock() = Some(Utc::now());
        metrics::record_poll_cycle(started.elapsed());

        if summary.refreshed > 0 {
            tracing::debug!(
                refreshed = summary.refreshed,
                updated = summary.updated,
                missed = summary.missed,
                elapsed_ms = started.elapsed().as_millis(),
                "Poll cycle complete"
            );
        }
        summary
    }

    /// Fetch one key and broadcast it if it changed.
    pub async fn refresh_one(&self, key: &InstrumentKey) -> RefreshOutcome {
        let kind = key.kind();
        let outcome = match self.gated_fetch(key, kind).await {
            Ok(snapshot) => self.apply(key, snapshot),
            Err(FetchError::Timeout) => {
                tracing::warn!(ticker = %key, timeout = ?self.gate.timeout(), "Fetch timed out");
                RefreshOutcome::TimedOut
            }
            Err(e) => {
                if e.is_not_found() {
                    tracing::debug!(ticker = %key, "No data");
                } else {
                    tracing::warn!(ticker = %key, error = %e, "Fetch failed");
                }
                RefreshOutcome::NoData
            }
        };

        metrics::record_fetch(kind, outcome);
        outcome
    }

    async fn gated_fetch(
        &self,
        key: &InstrumentKey,
        kind: InstrumentKind,
    ) -> Result<Snapshot, FetchError> {
        self.gate
            .run(async {
                let started = Instant::now();
                let result = self.fetcher.fetch(key).await;
                metrics::record_fetch_duration(kind, started.elapsed());
                result
            })
            .await?
    }

    fn apply(&self, key: &InstrumentKey, snapshot: Snapshot) -> RefreshOutcome {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let Some(entry) = state.store.get_mut(key) else {
            return RefreshOutcome::Untracked;
        };
        let now = Utc::now();
        if !entry.apply(snapshot.clone(), now) {
            return RefreshOutcome::Unchanged;
        }

        let delivered = state.broadcast(key, &snapshot, now);
        tracing::debug!(ticker = %key, delivered, "Broadcast update");
        RefreshOutcome::Updated
    }

    /// One-shot fetch through the gate without tracking the key.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, or [`FetchError::Timeout`] on timeout.
    pub async fn lookup(&self, key: &InstrumentKey) -> Result<Snapshot, FetchError> {
        self.gated_fetch(key, key.kind()).await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Whether the coordinating loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Close every client queue and drop all state.
    pub fn shutdown(&self) {
        let mut state = self.state.write();
        for client in state.clients.values() {
            client.close();
        }
        let closed = state.clients.len();
        *state = HubState::default();
        state.publish_gauges();
        tracing::info!(clients = closed, "Hub state cleared");
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        let state = self.state.read();
        HubStats {
            clients: state.clients.len(),
            tracked_instruments: state.store.len(),
            subscriptions: state.subscriptions.pair_count(),
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            last_poll_at: *self.last_poll_at.lock(),
        }
    }

    /// Copy of the store entry for a key.
    #[must_use]
    pub fn entry(&self, key: &InstrumentKey) -> Option<StoreEntry> {
        self.state.read().store.get(key).cloned()
    }

    /// Whether a key is in the store.
    #[must_use]
    pub fn is_tracked(&self, key: &InstrumentKey) -> bool {
        self.state.read().store.contains_key(key)
    }

    /// All tracked keys.
    #[must_use]
    pub fn tracked_keys(&self) -> Vec<InstrumentKey> {
        self.state.read().store.keys().cloned().collect()
    }

    /// Subscribers of a key.
    #[must_use]
    pub fn subscribers(&self, key: &InstrumentKey) -> Vec<ClientId> {
        self.state.read().subscriptions.subscribers(key).collect()
    }

    /// Keys a client subscribes to.
    #[must_use]
    pub fn client_subscriptions(&self, id: ClientId) -> Vec<InstrumentKey> {
        self.state.read().subscriptions.client_keys(id)
    }

    /// Whether the store and subscription index agree.
    ///
    /// Holds at every observation: each store entry has a subscriber, each
    /// subscribed key has an entry, and the index is symmetric.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let state = self.state.read();
        state.subscriptions.is_symmetric()
            && state.store.len() == state.subscriptions.key_count()
            && state.subscriptions.keys().all(|key| state.store.contains_key(key))
    }
}

impl From<GateError> for FetchError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::TimedOut(_) => Self::Timeout,
            GateError::Closed => Self::Network(err.to_string()),
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Payload> {
    match message.encode() {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!(error = %e, ticker = %message.ticker, "Failed to encode message");
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::ports::MockSnapshotFetcher;
    use crate::domain::snapshot::tests::{crypto, stock};

    fn key(raw: &str) -> InstrumentKey {
        InstrumentKey::parse(raw).unwrap()
    }

    fn hub_with(fetcher: MockSnapshotFetcher) -> Arc<Hub> {
        Hub::new(Arc::new(fetcher), HubConfig::default())
    }

    fn connect(hub: &Hub, raw: u64) -> (ClientId, mpsc::Receiver<Payload>) {
        let id = ClientId::from_raw(raw);
        let (client, rx) = ClientHandle::new(id, 16);
        hub.register_client(client);
        (id, rx)
    }

    async fn next(rx: &mut mpsc::Receiver<Payload>) -> Value {
        let payload = rx.recv().await.unwrap();
        serde_json::from_str(&payload).unwrap()
    }

    fn try_next(rx: &mut mpsc::Receiver<Payload>) -> Option<Value> {
        rx.try_recv().ok().map(|p| serde_json::from_str(&p).unwrap())
    }

    #[tokio::test]
    async fn subscribe_acks_then_delivers_immediate_fetch() {
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|k| k.as_str() == "TSLA:NASDAQ")
            .returning(|_| Ok(stock("182.50")));
        let hub = hub_with(fetcher);
        let (id, mut rx) = connect(&hub, 1);

        hub.subscribe(id, "tsla:nasdaq");

        let ack = next(&mut rx).await;
        assert_eq!(ack["type"], "subscribed");
        assert_eq!(ack["ticker"], "TSLA:NASDAQ");

        let update = next(&mut rx).await;
        assert_eq!(update["type"], "stock_update");
        assert_eq!(update["data"]["stockName"], "Tesla Inc");
        assert!(hub.entry(&key("TSLA:NASDAQ")).unwrap().has_data());
    }

    #[tokio::test]
    async fn cached_snapshot_is_sent_synchronously() {
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok(crypto("65000")));
        let hub = hub_with(fetcher);
        let (first, mut rx1) = connect(&hub, 1);
        let (second, mut rx2) = connect(&hub, 2);

        hub.subscribe(first, "BTC-USD");
        next(&mut rx1).await;
        next(&mut rx1).await;

        hub.subscribe(second, "btc-usd");

        assert_eq!(try_next(&mut rx2).unwrap()["type"], "subscribed");
        assert_eq!(try_next(&mut rx2).unwrap()["type"], "crypto_update");
    }

    #[tokio::test]
    async fn cached_snapshot_keeps_its_update_time() {
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok(crypto("65000")));
        let hub = hub_with(fetcher);
        let (first, mut rx1) = connect(&hub, 1);
        let (second, mut rx2) = connect(&hub, 2);

        hub.subscribe(first, "BTC-USD");
        next(&mut rx1).await;
        let fresh = next(&mut rx1).await;
        let updated_at = hub.entry(&key("BTC-USD")).unwrap().last_updated.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        hub.subscribe(second, "BTC-USD");
        try_next(&mut rx2).unwrap();
        let cached = try_next(&mut rx2).unwrap();

        let stamp = |msg: &Value| {
            DateTime::parse_from_rfc3339(msg["timestamp"].as_str().unwrap())
                .unwrap()
                .with_timezone(&Utc)
        };
        assert_eq!(stamp(&fresh), updated_at);
        assert_eq!(stamp(&cached), updated_at);
    }

    #[tokio::test]
    async fn empty_key_and_unknown_client_are_ignored() {
        let hub = hub_with(MockSnapshotFetcher::new());
        let (id, mut rx) = connect(&hub, 1);

        hub.subscribe(id, "   ");
        hub.subscribe(ClientId::from_raw(99), "TSLA:NASDAQ");

        assert!(try_next(&mut rx).is_none());
        assert_eq!(hub.stats().tracked_instruments, 0);
    }

    #[tokio::test]
    async fn unsubscribe_evicts_and_always_acks() {
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|k| Err(FetchError::NotFound(k.to_string())));
        let hub = hub_with(fetcher);
        let (id, mut rx) = connect(&hub, 1);

        hub.subscribe(id, "ETH-USD");
        assert!(hub.is_tracked(&key("ETH-USD")));
        hub.unsubscribe(id, "eth-usd");
        assert!(!hub.is_tracked(&key("ETH-USD")));

        hub.unsubscribe(id, "DOGE-USD");

        assert_eq!(try_next(&mut rx).unwrap()["type"], "subscribed");
        assert_eq!(try_next(&mut rx).unwrap()["type"], "unsubscribed");
        let stray = try_next(&mut rx).unwrap();
        assert_eq!(stray["type"], "unsubscribed");
        assert_eq!(stray["ticker"], "DOGE-USD");
        assert!(hub.is_consistent());
    }

    #[tokio::test]
    async fn refresh_broadcasts_only_on_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher.expect_fetch().returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(if n < 2 { stock("182.50") } else { stock("183.00") })
        });
        let hub = hub_with(fetcher);
        let (id, mut rx) = connect(&hub, 1);

        hub.subscribe(id, "TSLA:NASDAQ");
        next(&mut rx).await;
        next(&mut rx).await;

        assert_eq!(hub.refresh_one(&key("TSLA:NASDAQ")).await, RefreshOutcome::Unchanged);
        assert!(try_next(&mut rx).is_none());

        assert_eq!(hub.refresh_one(&key("TSLA:NASDAQ")).await, RefreshOutcome::Updated);
        assert_eq!(try_next(&mut rx).unwrap()["data"]["price"], 183.0);
        assert!(try_next(&mut rx).is_none());
    }

    #[tokio::test]
    async fn miss_leaves_entry_untouched() {
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher.expect_fetch().returning(|k| {
            Err(FetchError::Status {
                key: k.to_string(),
                status: 503,
            })
        });
        let hub = hub_with(fetcher);
        let (id, mut rx) = connect(&hub, 1);
        hub.subscribe(id, "TSLA:NASDAQ");
        next(&mut rx).await;

        assert_eq!(hub.refresh_one(&key("TSLA:NASDAQ")).await, RefreshOutcome::NoData);
        assert!(!hub.entry(&key("TSLA:NASDAQ")).unwrap().has_data());
        assert!(try_next(&mut rx).is_none());
    }

    #[tokio::test]
    async fn refresh_of_evicted_key_is_discarded() {
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok(stock("1")));
        let hub = hub_with(fetcher);

        assert_eq!(hub.refresh_one(&key("GONE:NYSE")).await, RefreshOutcome::Untracked);
        assert!(!hub.is_tracked(&key("GONE:NYSE")));
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_closes_queue() {
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|k| Err(FetchError::NotFound(k.to_string())));
        let hub = hub_with(fetcher);
        let (id, mut rx) = connect(&hub, 1);
        hub.subscribe(id, "TSLA:NASDAQ");
        hub.subscribe(id, "BTC-USD");

        assert!(hub.unregister_client(id));
        assert!(!hub.unregister_client(id));

        assert_eq!(hub.stats().tracked_instruments, 0);
        assert!(hub.client_subscriptions(id).is_empty());
        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn poll_cycle_refreshes_every_tracked_key() {
        let mut fetcher = MockSnapshotFetcher::new();
        fetcher.expect_fetch().returning(|k| {
            if k.kind() == InstrumentKind::Crypto {
                Ok(crypto("65000"))
            } else {
                Err(FetchError::NotFound(k.to_string()))
            }
        });
        let hub = hub_with(fetcher);
        let (id, mut rx) = connect(&hub, 1);
        hub.subscribe(id, "BTC-USD");
        hub.subscribe(id, "TSLA:NASDAQ");
        next(&mut rx).await;
        next(&mut rx).await;
        next(&mut rx).await;

        let summary = hub.poll_cycle().await;

        assert_eq!(summary.refreshed, 2);
        assert_eq!(summary.missed, 1);
        let stats = hub.stats();
        assert_eq!(stats.poll_cycles, 1);
        assert!(stats.last_poll_at.is_some());
    }

    #[tokio::test]
    async fn shutdown_closes_all_clients() {
        let hub = hub_with(MockSnapshotFetcher::new());
        let (_, mut rx1) = connect(&hub, 1);
        let (_, mut rx2) = connect(&hub, 2);

        hub.shutdown();

        assert!(rx1.recv().await.is_none());
        assert!(rx2.recv().await.is_none());
        assert_eq!(hub.stats().clients, 0);
    }

    #[test]
    fn stats_serialize_camel_case() {
        let hub = hub_with(MockSnapshotFetcher::new());
        let json = serde_json::to_value(hub.stats()).unwrap();
        assert_eq!(json["trackedInstruments"], 0);
        assert!(json["lastPollAt"].is_null());
    }
}
