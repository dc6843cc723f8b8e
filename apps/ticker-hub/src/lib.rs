#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Ticker Hub - Demand-Driven Quote Feed
//!
//! A WebSocket service that refreshes equity and crypto snapshots only for
//! instruments some client is subscribed to, and pushes each change to
//! exactly those clients.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `instrument`: Instrument keys and kinds
//!   - `snapshot`: Stock and crypto snapshots, store entries
//!   - `subscription`: Client ids and the bidirectional subscription index
//!   - `protocol`: WebSocket command and message shapes
//!   - `search`: Instrument search results
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: The `SnapshotFetcher` and `InstrumentSearch` interfaces
//!   - `services`: Hub, Worker Pool Gate, client handles, coordinating loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `fetcher`: Quote page fetcher and search
//!   - `server` / `ws`: HTTP routes, CORS, per-IP limiting, WebSocket sessions
//!   - `config`, `health`, `metrics`, `telemetry`: Ambient concerns
//!
//! # Data Flow
//!
//! ```text
//!                    ┌──────────────┐  subscribe/unsubscribe  ┌──────────┐
//!  Client ──/ws────► │   session    │ ──────────────────────► │          │
//!         ◄───────── │ read + write │ ◄────── queue ───────── │   Hub    │
//!                    └──────────────┘                         │          │
//!                                     tick ► coordinator ───► │ poll     │
//!                                                             └────┬─────┘
//!                                                  Worker Pool Gate│
//!                                                             ┌────▼─────┐
//!                                                             │ Fetcher  │
//!                                                             └──────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{InstrumentKey, InstrumentKind};
pub use domain::protocol::{ClientCommand, MessageType, ServerMessage};
pub use domain::search::SearchResult;
pub use domain::snapshot::{CryptoSnapshot, Snapshot, StockSnapshot};
pub use domain::subscription::ClientId;

// Ports and services
pub use application::ports::{FetchError, InstrumentSearch, SnapshotFetcher};
pub use application::services::{Hub, HubConfig, HubHandle, HubStats, RefreshOutcome};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, RateLimitSettings, TickerHubConfig, WebSocketSettings,
};

// HTTP server
pub use infrastructure::server::{
    AppState, HttpServer, IpRateLimiter, ServerError, router, serve,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
