//! Subscription Index
//!
//! The many-to-many relation between connected clients and the instrument
//! keys they subscribe to.
//!
//! # Design
//!
//! Both directions live in one structure and are updated together, so the
//! symmetry invariant holds whenever the index is observed:
//!
//! ```text
//! key ∈ by_client[c]  ⇔  c ∈ by_key[key]
//! ```
//!
//! Empty sets are removed eagerly; a key present in `by_key` always has at
//! least one subscriber. The index is not synchronized itself; the Hub keeps
//! it behind its state lock.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::instrument::InstrumentKey;

// =============================================================================
// Client Identity
// =============================================================================

/// Unique identifier for a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Generate a new random client ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().as_u64_pair().0)
    }

    /// Wrap a raw ID value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{:016x}", self.0)
    }
}

// =============================================================================
// Subscription Index
// =============================================================================

/// Symmetric client ⇄ instrument relation.
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    /// Map from client to the keys it subscribes to.
    by_client: HashMap<ClientId, HashSet<InstrumentKey>>,
    /// Map from key to its subscribers.
    by_key: HashMap<InstrumentKey, HashSet<ClientId>>,
}

impl SubscriptionIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a client to a key.
    ///
    /// Returns `true` if this is the key's first subscriber (0→1).
    pub fn add(&mut self, client: ClientId, key: &InstrumentKey) -> bool {
        let client_keys = self.by_client.entry(client).or_default();
        if !client_keys.insert(key.clone()) {
            return false;
        }

        let subscribers = self.by_key.entry(key.clone()).or_default();
        subscribers.insert(client);
        subscribers.len() == 1
    }

    /// Unsubscribe a client from a key.
    ///
    /// Returns `true` if the key lost its last subscriber (1→0).
    pub fn remove(&mut self, client: ClientId, key: &InstrumentKey) -> bool {
        let Some(client_keys) = self.by_client.get_mut(&client) else {
            return false;
        };

        // Skip if client wasn't subscribed
        if !client_keys.remove(key) {
            return false;
        }
        if client_keys.is_empty() {
            self.by_client.remove(&client);
        }

        self.detach(client, key)
    }

    /// Remove every subscription held by a client.
    ///
    /// Returns the keys that lost their last subscriber.
    pub fn remove_client(&mut self, client: ClientId) -> Vec<InstrumentKey> {
        let Some(client_keys) = self.by_client.remove(&client) else {
            return vec![];
        };

        client_keys
            .into_iter()
            .filter(|key| self.detach(client, key))
            .collect()
    }

    /// Drop `client` from the subscriber set of `key`, pruning empty sets.
    fn detach(&mut self, client: ClientId, key: &InstrumentKey) -> bool {
        let Some(subscribers) = self.by_key.get_mut(key) else {
            return false;
        };
        subscribers.remove(&client);
        if subscribers.is_empty() {
            self.by_key.remove(key);
            return true;
        }
        false
    }

    /// Subscribers of a key (empty if none).
    pub fn subscribers(&self, key: &InstrumentKey) -> impl Iterator<Item = ClientId> + '_ {
        self.by_key.get(key).into_iter().flatten().copied()
    }

    /// Number of subscribers of a key.
    #[must_use]
    pub fn subscriber_count(&self, key: &InstrumentKey) -> usize {
        self.by_key.get(key).map_or(0, HashSet::len)
    }

    /// Keys a client subscribes to.
    #[must_use]
    pub fn client_keys(&self, client: ClientId) -> Vec<InstrumentKey> {
        self.by_client
            .get(&client)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a client subscribes to a key.
    #[must_use]
    pub fn contains(&self, client: ClientId, key: &InstrumentKey) -> bool {
        self.by_client
            .get(&client)
            .is_some_and(|keys| keys.contains(key))
    }

    /// All keys with at least one subscriber.
    pub fn keys(&self) -> impl Iterator<Item = &InstrumentKey> + '_ {
        self.by_key.keys()
    }

    /// Number of keys with at least one subscriber.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    /// Total number of (client, key) pairs.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.by_client.values().map(HashSet::len).sum()
    }

    /// Check the symmetry invariant in both directions.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        let forward = self.by_client.iter().all(|(client, keys)| {
            keys.iter()
                .all(|key| self.by_key.get(key).is_some_and(|s| s.contains(client)))
        });
        let backward = self.by_key.iter().all(|(key, clients)| {
            clients
                .iter()
                .all(|client| self.by_client.get(client).is_some_and(|k| k.contains(key)))
        });
        forward && backward
    }
}

// =============================================================================
// Tests
// =============================================================================
