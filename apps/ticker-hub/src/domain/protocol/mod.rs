//! Wire Protocol
//!
//! JSON messages exchanged with WebSocket clients.
//!
//! ```text
//! client → hub   {"action":"subscribe","ticker":"tsla:nasdaq"}
//! hub → client   {"type":"subscribed","ticker":"TSLA:NASDAQ","timestamp":"..."}
//! hub → client   {"type":"stock_update","ticker":"TSLA:NASDAQ","data":{...},"timestamp":"..."}
//! ```
//!
//! Outbound messages are encoded once into a shared [`Payload`] so a
//! broadcast to N subscribers does not serialize N times.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::instrument::{InstrumentKey, InstrumentKind};
use super::snapshot::Snapshot;

/// An encoded outbound message, shared between client queues.
pub type Payload = Arc<str>;

/// Error text sent for frames that are not a valid command object.
pub const INVALID_FORMAT_ERROR: &str =
    "invalid message format, expected JSON with 'action' and 'ticker' fields";

// =============================================================================
// Inbound
// =============================================================================

/// A raw command frame from a client.
///
/// Missing fields deserialize as empty strings; validation happens in
/// [`ClientCommand::action`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientCommand {
    /// Requested action (`subscribe` or `unsubscribe`).
    #[serde(default)]
    pub action: String,
    /// Raw instrument key, not yet normalized.
    #[serde(default)]
    pub ticker: String,
}

/// A recognized client action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start receiving updates for a key.
    Subscribe,
    /// Stop receiving updates for a key.
    Unsubscribe,
}

/// Why an inbound frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Frame was not a JSON command object.
    #[error("invalid message format, expected JSON with 'action' and 'ticker' fields")]
    InvalidFormat,
    /// Action was neither `subscribe` nor `unsubscribe`.
    #[error("unknown action: {0}. Use 'subscribe' or 'unsubscribe'")]
    UnknownAction(String),
}

impl ClientCommand {
    /// Decode a command from a frame body.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidFormat`] if the body is not a JSON object.
    pub fn decode(body: &[u8]) -> Result<Self, CommandError> {
        serde_json::from_slice(body).map_err(|_| CommandError::InvalidFormat)
    }

    /// Resolve the action field.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownAction`] for anything other than the
    /// two supported actions (matched exactly).
    pub fn action(&self) -> Result<Action, CommandError> {
        match self.action.as_str() {
            "subscribe" => Ok(Action::Subscribe),
            "unsubscribe" => Ok(Action::Unsubscribe),
            other => Err(CommandError::UnknownAction(other.to_string())),
        }
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// The `type` field of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Equity snapshot update.
    StockUpdate,
    /// Crypto snapshot update.
    CryptoUpdate,
    /// Subscription acknowledged.
    Subscribed,
    /// Unsubscription acknowledged.
    Unsubscribed,
    /// Command rejected.
    Error,
}

impl MessageType {
    /// Update type for an instrument kind.
    #[must_use]
    pub const fn update_for(kind: InstrumentKind) -> Self {
        match kind {
            InstrumentKind::Equity => Self::StockUpdate,
            InstrumentKind::Crypto => Self::CryptoUpdate,
        }
    }

    /// Wire label, also used as a metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StockUpdate => "stock_update",
            Self::CryptoUpdate => "crypto_update",
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
            Self::Error => "error",
        }
    }
}

/// A message pushed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Normalized key, empty for errors.
    pub ticker: String,
    /// Snapshot, present only on updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Snapshot>,
    /// Error text, present only on errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the carried data was last updated, or when an ack or error
    /// was built.
    pub timestamp: DateTime<Utc>,
}

impl ServerMessage {
    /// Subscription acknowledgment.
    #[must_use]
    pub fn subscribed(key: &InstrumentKey) -> Self {
        Self::bare(MessageType::Subscribed, key.to_string())
    }

    /// Unsubscription acknowledgment.
    #[must_use]
    pub fn unsubscribed(key: &InstrumentKey) -> Self {
        Self::bare(MessageType::Unsubscribed, key.to_string())
    }

    /// Snapshot update, typed by the snapshot's kind and stamped with the
    /// time the store last accepted it.
    #[must_use]
    pub fn update(key: &InstrumentKey, snapshot: Snapshot, updated_at: DateTime<Utc>) -> Self {
        Self {
            kind: MessageType::update_for(snapshot.kind()),
            ticker: key.to_string(),
            data: Some(snapshot),
            error: None,
            timestamp: updated_at,
        }
    }

    /// Error report for the offending client.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::bare(MessageType::Error, String::new())
        }
    }

    fn bare(kind: MessageType, ticker: String) -> Self {
        Self {
            kind,
            ticker,
            data: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Encode to a shared JSON payload.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; callers log and drop.
    pub fn encode(&self) -> Result<Payload, serde_json::Error> {
        serde_json::to_string(self).map(Payload::from)
    }
}

impl From<CommandError> for ServerMessage {
    fn from(err: CommandError) -> Self {
        Self::error(err.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
