//! Instrument Snapshots
//!
//! Immutable, kind-specific data records for one instrument at one point in
//! time. Snapshots are compared by full structural equality to detect change;
//! prices are `Decimal`, so equality is exact.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instrument::{InstrumentKey, InstrumentKind};

// =============================================================================
// Equity Snapshot
// =============================================================================

/// Key statistics for an exchange-listed equity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    /// Display name (e.g. "Tesla Inc").
    pub stock_name: String,
    /// Last traded price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Previous session close.
    #[serde(with = "rust_decimal::serde::float")]
    pub previous_close: Decimal,
    /// `price - previous_close`.
    #[serde(with = "rust_decimal::serde::float")]
    pub change: Decimal,
    /// Change relative to the previous close, in percent.
    #[serde(with = "rust_decimal::serde::float")]
    pub change_percent: Decimal,
    /// Intraday range as rendered by the source (e.g. "$180.10 - $185.00").
    pub day_range: String,
    /// 52-week range as rendered by the source.
    pub year_range: String,
    /// Volume as rendered by the source (e.g. "98.12M").
    pub volume: String,
    /// Market capitalization as rendered by the source.
    pub market_cap: String,
    /// Price/earnings ratio, absent for loss-making or non-equity listings.
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub pe_ratio: Option<Decimal>,
    /// Primary listing exchange.
    pub primary_exchange: String,
}

// =============================================================================
// Crypto Snapshot
// =============================================================================

/// Key statistics for a crypto pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoSnapshot {
    /// Display name (e.g. "Bitcoin (BTC / USD)").
    pub crypto_name: String,
    /// Short description as rendered by the source.
    pub description: String,
    /// Last traded price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Previous close.
    #[serde(with = "rust_decimal::serde::float")]
    pub previous_close: Decimal,
    /// `price - previous_close`.
    #[serde(with = "rust_decimal::serde::float")]
    pub change: Decimal,
    /// Change relative to the previous close, in percent.
    #[serde(with = "rust_decimal::serde::float")]
    pub change_percent: Decimal,
}

// =============================================================================
// Snapshot
// =============================================================================

/// A snapshot of either kind.
///
/// Serialized untagged: the wire message type (`stock_update` /
/// `crypto_update`) already carries the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Snapshot {
    /// Equity snapshot.
    Stock(StockSnapshot),
    /// Crypto snapshot.
    Crypto(CryptoSnapshot),
}

impl Snapshot {
    /// The kind of instrument this snapshot describes.
    #[must_use]
    pub const fn kind(&self) -> InstrumentKind {
        match self {
            Self::Stock(_) => InstrumentKind::Equity,
            Self::Crypto(_) => InstrumentKind::Crypto,
        }
    }

    /// The display name carried by the snapshot.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Stock(s) => &s.stock_name,
            Self::Crypto(c) => &c.crypto_name,
        }
    }

    /// The last traded price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        match self {
            Self::Stock(s) => s.price,
            Self::Crypto(c) => c.price,
        }
    }
}

/// Derive `(change, change_percent)` from a price and previous close.
///
/// The percentage is rounded to 4 decimal places and is zero when the
/// previous close is zero.
#[must_use]
pub fn price_change(price: Decimal, previous_close: Decimal) -> (Decimal, Decimal) {
    let change = price - previous_close;
    if previous_close.is_zero() {
        return (change, Decimal::ZERO);
    }
    let percent = (change / previous_close * Decimal::ONE_HUNDRED).round_dp(4);
    (change, percent)
}

// =============================================================================
// Store Entry
// =============================================================================

/// The Hub's record for one tracked instrument.
///
/// An entry exists only while at least one client subscribes to its key.
/// `snapshot` stays `None` until the first successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// Normalized key.
    pub key: InstrumentKey,
    /// Kind inferred from the key shape.
    pub kind: InstrumentKind,
    /// Latest known snapshot.
    pub snapshot: Option<Snapshot>,
    /// When `snapshot` last changed.
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoreEntry {
    /// Create an entry with no data yet.
    #[must_use]
    pub fn new(key: InstrumentKey) -> Self {
        let kind = key.kind();
        Self {
            key,
            kind,
            snapshot: None,
            last_updated: None,
        }
    }

    /// Whether a snapshot has been populated.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Replace the snapshot if it differs structurally from the current one.
    ///
    /// Returns `true` when the entry changed (including the first population).
    pub fn apply(&mut self, snapshot: Snapshot, now: DateTime<Utc>) -> bool {
        if self.snapshot.as_ref() == Some(&snapshot) {
            return false;
        }
        self.snapshot = Some(snapshot);
        self.last_updated = Some(now);
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
