//! Instrument Keys
//!
//! Normalized identifiers for tradable instruments. Two shapes exist:
//!
//! - `SYMBOL:EXCHANGE` for equities (e.g. `TSLA:NASDAQ`)
//! - `COIN-CURRENCY` for crypto pairs (e.g. `BTC-USD`)
//!
//! The separator is the sole discriminator. Keys are case-insensitive at the
//! edge and canonicalized to trimmed uppercase internally.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between symbol and exchange in equity keys.
pub const EQUITY_SEPARATOR: char = ':';

/// Separator between coin and quote currency in crypto keys.
pub const CRYPTO_SEPARATOR: char = '-';

// =============================================================================
// Instrument Kind
// =============================================================================

/// The kind of instrument a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    /// Exchange-listed equity or index (`SYMBOL:EXCHANGE`).
    Equity,
    /// Crypto pair (`COIN-CURRENCY`).
    Crypto,
}

impl InstrumentKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Crypto => "crypto",
        }
    }
}

// =============================================================================
// Instrument Key
// =============================================================================

/// Error returned for keys that cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Key was empty after trimming.
    #[error("instrument key cannot be empty")]
    Empty,
}

/// A normalized, uppercase instrument key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentKey(String);

impl InstrumentKey {
    /// Normalize a raw key: trim surrounding whitespace and uppercase.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Empty`] if nothing remains after trimming.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self(normalized))
    }

    /// The kind inferred from the key shape.
    #[must_use]
    pub fn kind(&self) -> InstrumentKind {
        if self.0.contains(EQUITY_SEPARATOR) {
            InstrumentKind::Equity
        } else {
            InstrumentKind::Crypto
        }
    }

    /// Split a crypto key into `(coin, currency)`.
    ///
    /// Returns `None` for equity keys or crypto keys without a separator.
    #[must_use]
    pub fn crypto_pair(&self) -> Option<(&str, &str)> {
        if self.kind() != InstrumentKind::Crypto {
            return None;
        }
        self.0
            .split_once(CRYPTO_SEPARATOR)
            .filter(|(coin, currency)| !coin.is_empty() && !currency.is_empty())
    }

    /// The normalized key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InstrumentKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InstrumentKey> for String {
    fn from(key: InstrumentKey) -> Self {
        key.0
    }
}

impl AsRef<str> for InstrumentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Tests
// =============================================================================
