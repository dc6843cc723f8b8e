//! Instrument search results.

use serde::{Deserialize, Serialize};

/// One instrument matching a free-text query.
///
/// `exchange` holds the exchange for equities and indices, and the quote
/// currency for crypto pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchResult {
    /// Display symbol, e.g. `TSLA`, `.DJI` or `BTC`.
    pub ticker: String,
    /// Instrument name.
    pub name: String,
    /// Exchange or quote currency.
    pub exchange: String,
}
