//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the HTTP and WebSocket surface.

/// Configuration loaded from the environment.
pub mod config;

/// Quote page fetcher implementing `SnapshotFetcher`.
pub mod fetcher;

/// Health check and metrics endpoints.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// HTTP server, router, and quote lookup.
pub mod server;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// WebSocket upgrade and client sessions.
pub mod ws;
