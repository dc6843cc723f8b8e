//! Domain Layer - Instrument, snapshot and subscription types.
//!
//! Pure types with serde support and no I/O. The Hub in the application
//! layer is the only code that mutates them at runtime.

/// Instrument keys and kinds.
pub mod instrument;

/// Snapshot value objects and store entries.
pub mod snapshot;

/// Client ⇄ instrument subscription index.
pub mod subscription;

/// WebSocket wire protocol.
pub mod protocol;

/// Instrument search results.
pub mod search;
