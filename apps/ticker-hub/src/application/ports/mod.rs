//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SnapshotFetcher`: Produces a snapshot for an instrument key, or
//!   signals that no data is available
//! - `InstrumentSearch`: Resolves a free-text query to candidate instruments

use async_trait::async_trait;

use crate::domain::instrument::InstrumentKey;
use crate::domain::search::SearchResult;
use crate::domain::snapshot::Snapshot;

/// Why a fetch produced no snapshot.
///
/// Every variant is a transient miss from the Hub's point of view: the
/// store entry is left untouched and the key is retried on the next poll.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The source has no data for this key.
    #[error("no data found for {0}")]
    NotFound(String),

    /// The source answered with an unexpected HTTP status.
    #[error("unexpected status {status} for {key}")]
    Status {
        /// Key that was requested.
        key: String,
        /// HTTP status code.
        status: u16,
    },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be turned into a snapshot.
    #[error("parse error for {key}: {reason}")]
    Parse {
        /// Key that was requested.
        key: String,
        /// What could not be parsed.
        reason: String,
    },

    /// The fetch did not finish within the configured timeout.
    #[error("fetch timed out")]
    Timeout,
}

impl FetchError {
    /// Whether the source explicitly had nothing for the key.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Snapshot source for instrument keys.
///
/// Implementations must be safe to call concurrently from every worker
/// permitted by the gate; calls are independent of each other.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch the current snapshot for a key.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when no snapshot could be produced.
    async fn fetch(&self, key: &InstrumentKey) -> Result<Snapshot, FetchError>;
}

/// Free-text instrument lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstrumentSearch: Send + Sync {
    /// Instruments matching `query`, in source order.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the source could not be queried.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, FetchError>;
}
