//! Health Check and Metrics Endpoints
//!
//! Health checks, hub status reporting, and Prometheus metrics. Used by
//! container orchestrators, load balancers, and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness check (simple OK)
//! - `GET /readyz` - Kubernetes readiness check (coordinating loop running)
//! - `GET /metrics` - Prometheus metrics in text format

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::HubStats;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::server::AppState;

/// Poll cycles older than this many intervals mark the hub as degraded.
const STALE_INTERVALS: u32 = 3;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Hub statistics.
    pub hub: HubStats,
    /// Poll configuration.
    pub poll: PollStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Polling on schedule.
    Healthy,
    /// Loop running but poll cycles are stale.
    Degraded,
    /// Coordinating loop stopped.
    Unhealthy,
}

/// Poll configuration as reported by `/health`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatus {
    /// Poll interval in milliseconds.
    pub interval_ms: u64,
    /// Worker Pool Gate width.
    pub workers: usize,
    /// Permits currently held by fetches.
    pub busy_workers: usize,
}

// =============================================================================
// HTTP Handlers
// =============================================================================

pub(crate) async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(crate) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(crate) async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.hub.hub().is_running() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub(crate) async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let hub = state.hub.hub();
    let config = hub.config();
    let stats = hub.stats();
    let now = Utc::now();

    let status = determine_health_status(
        hub.is_running(),
        stats.tracked_instruments,
        stats.last_poll_at.unwrap_or(state.started_at_utc),
        now,
        config.poll_interval,
    );

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: now,
        hub: stats,
        poll: PollStatus {
            interval_ms: u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX),
            workers: config.workers,
            busy_workers: hub.gate().width().saturating_sub(hub.gate().available()),
        },
    }
}

/// Classify hub health.
///
/// `last_activity` is the end of the last poll cycle, or process start if
/// none has finished yet.
fn determine_health_status(
    running: bool,
    tracked: usize,
    last_activity: DateTime<Utc>,
    now: DateTime<Utc>,
    interval: Duration,
) -> HealthStatus {
    if !running {
        return HealthStatus::Unhealthy;
    }
    if tracked == 0 {
        return HealthStatus::Healthy;
    }

    let stale_after = chrono::Duration::from_std(interval * STALE_INTERVALS)
        .unwrap_or(chrono::Duration::MAX);
    if now.signed_duration_since(last_activity) > stale_after {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(5);

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn determine_status_stopped_loop() {
        let now = Utc::now();
        let status = determine_health_status(false, 0, now, now, INTERVAL);
        assert_eq!(status, HealthStatus::Unhealthy);
    }

    #[test]
    fn determine_status_idle_hub() {
        let now = Utc::now();
        let long_ago = now - chrono::Duration::hours(1);
        let status = determine_health_status(true, 0, long_ago, now, INTERVAL);
        assert_eq!(status, HealthStatus::Healthy);
    }

    #[test]
    fn determine_status_recent_poll() {
        let now = Utc::now();
        let recent = now - chrono::Duration::seconds(6);
        let status = determine_health_status(true, 4, recent, now, INTERVAL);
        assert_eq!(status, HealthStatus::Healthy);
    }

    #[test]
    fn determine_status_stale_poll() {
        let now = Utc::now();
        let stale = now - chrono::Duration::seconds(16);
        let status = determine_health_status(true, 4, stale, now, INTERVAL);
        assert_eq!(status, HealthStatus::Degraded);
    }

    #[test]
    fn poll_status_is_camel_case() {
        let json = serde_json::to_value(PollStatus {
            interval_ms: 5000,
            workers: 10,
            busy_workers: 2,
        })
        .unwrap();
        assert_eq!(json["intervalMs"], 5000);
        assert_eq!(json["workers"], 10);
        assert_eq!(json["busyWorkers"], 2);
    }
}
