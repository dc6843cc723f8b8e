//! Prometheus Metrics Module
//!
//! Exposes hub metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Clients**: Connected WebSocket clients
//! - **Instruments**: Tracked store entries
//! - **Fetches**: Refresh outcomes and latency per instrument kind
//! - **Messages**: Messages enqueued and dropped per message type
//! - **Polling**: Poll cycle duration
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port. Recording is a
//! no-op until [`init_metrics`] installs the recorder.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::services::RefreshOutcome;
use crate::domain::instrument::InstrumentKind;
use crate::domain::protocol::MessageType;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_gauge!("ticker_hub_clients", "Number of connected WebSocket clients");
    describe_gauge!(
        "ticker_hub_tracked_instruments",
        "Number of instruments with at least one subscriber"
    );

    describe_counter!(
        "ticker_hub_fetches_total",
        "Snapshot refreshes by instrument kind and outcome"
    );
    describe_histogram!(
        "ticker_hub_fetch_seconds",
        "Time spent in the snapshot fetcher, excluding permit wait"
    );

    describe_counter!(
        "ticker_hub_messages_sent_total",
        "Messages enqueued to client queues"
    );
    describe_counter!(
        "ticker_hub_messages_dropped_total",
        "Messages dropped because a client queue was full"
    );

    describe_histogram!(
        "ticker_hub_poll_cycle_seconds",
        "Wall time of one poll cycle over all tracked instruments"
    );

    describe_counter!(
        "ticker_hub_http_rate_limited_total",
        "HTTP requests rejected by the per-IP rate limit"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Update the connected client count.
#[allow(clippy::cast_precision_loss)]
pub fn set_clients(count: usize) {
    gauge!("ticker_hub_clients").set(count as f64);
}

/// Update the tracked instrument count.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_instruments(count: usize) {
    gauge!("ticker_hub_tracked_instruments").set(count as f64);
}

/// Record the outcome of one refresh.
pub fn record_fetch(kind: InstrumentKind, outcome: RefreshOutcome) {
    counter!(
        "ticker_hub_fetches_total",
        "kind" => kind.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record fetcher latency.
pub fn record_fetch_duration(kind: InstrumentKind, duration: Duration) {
    histogram!(
        "ticker_hub_fetch_seconds",
        "kind" => kind.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record a message enqueued to a client.
pub fn record_message_sent(msg_type: MessageType) {
    counter!(
        "ticker_hub_messages_sent_total",
        "message_type" => msg_type.as_str()
    )
    .increment(1);
}

/// Record a message dropped on a full client queue.
pub fn record_message_dropped(msg_type: MessageType) {
    counter!(
        "ticker_hub_messages_dropped_total",
        "message_type" => msg_type.as_str()
    )
    .increment(1);
}

/// Record poll cycle duration.
pub fn record_poll_cycle(duration: Duration) {
    histogram!("ticker_hub_poll_cycle_seconds").record(duration.as_secs_f64());
}

/// Record a request rejected by the per-IP rate limit.
pub fn record_rate_limited() {
    counter!("ticker_hub_http_rate_limited_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================
