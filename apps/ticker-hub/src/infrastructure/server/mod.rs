//! HTTP Server
//!
//! One listener serves the WebSocket feed, the one-shot quote lookup and
//! search, and the health and metrics endpoints.
//!
//! # Routes
//!
//! - `GET /ws` - WebSocket upgrade
//! - `GET /quote/{key}` - Single snapshot lookup
//! - `GET /stocks/search/{query}` - Instrument search
//! - `GET /health`, `/healthz`, `/readyz`, `/metrics` - See [`health`](super::health)
//!
//! Every route answers cross-origin `GET`s. The feed, quote and search
//! routes are limited per client IP; health and metrics routes are not.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::application::ports::InstrumentSearch;
use crate::application::services::HubHandle;
use crate::domain::instrument::InstrumentKey;
use crate::domain::search::SearchResult;
use crate::infrastructure::config::{RateLimitSettings, WebSocketSettings};
use crate::infrastructure::health::{
    health_handler, liveness_handler, metrics_handler, readiness_handler,
};
use crate::infrastructure::ws::ws_handler;

mod rate_limit;

pub use rate_limit::IpRateLimiter;

/// How long browsers may cache a preflight response.
const CORS_MAX_AGE: Duration = Duration::from_secs(300);

// =============================================================================
// Shared State
// =============================================================================

/// State shared by every HTTP handler.
pub struct AppState {
    pub(crate) hub: HubHandle,
    pub(crate) search: Arc<dyn InstrumentSearch>,
    pub(crate) websocket: WebSocketSettings,
    pub(crate) rate_limiter: IpRateLimiter,
    pub(crate) rate_limit_window: Duration,
    pub(crate) version: String,
    pub(crate) started_at: Instant,
    pub(crate) started_at_utc: DateTime<Utc>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("hub", &self.hub)
            .field("websocket", &self.websocket)
            .field("rate_limiter", &self.rate_limiter)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new server state.
    #[must_use]
    pub fn new(
        hub: HubHandle,
        search: Arc<dyn InstrumentSearch>,
        websocket: WebSocketSettings,
        rate_limit: &RateLimitSettings,
        version: String,
    ) -> Self {
        Self {
            hub,
            search,
            websocket,
            rate_limiter: IpRateLimiter::new(rate_limit),
            rate_limit_window: rate_limit.window,
            version,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let limited = Router::new()
        .route("/ws", get(ws_handler))
        .route("/quote/{key}", get(quote_handler))
        .route("/stocks/search/{query}", get(search_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit::limit_by_ip,
        ));

    Router::new()
        .merge(limited)
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors_layer())
        .with_state(state)
}

/// Any origin may `GET`; credentials are never allowed.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .max_age(CORS_MAX_AGE)
}

// =============================================================================
// HTTP Server
// =============================================================================

/// HTTP + WebSocket server.
pub struct HttpServer {
    port: u16,
    state: Arc<AppState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<AppState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Ticker hub listening");
        tokio::spawn(prune_rate_limiter(
            Arc::clone(&self.state),
            self.cancel.clone(),
        ));
        serve(listener, self.state, self.cancel).await?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serve the router on an already bound listener until cancelled.
///
/// # Errors
///
/// Returns [`ServerError::ServerFailed`] on a fatal server error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ServerError::ServerFailed(e.to_string()))
}

/// Drop idle per-IP limiter state once per window.
async fn prune_rate_limiter(state: Arc<AppState>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(state.rate_limit_window);
    ticker.tick().await;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                state.rate_limiter.prune();
                tracing::trace!(tracked = state.rate_limiter.tracked(), "Pruned rate limiter");
            }
        }
    }
}

// =============================================================================
// Quote Lookup & Search
// =============================================================================

async fn quote_handler(State(state): State<Arc<AppState>>, Path(raw): Path<String>) -> Response {
    let Ok(key) = InstrumentKey::parse(&raw) else {
        return (StatusCode::BAD_REQUEST, "Ticker is required.").into_response();
    };

    match state.hub.hub().lookup(&key).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            tracing::debug!(ticker = %key, error = %e, "Quote lookup missed");
            (StatusCode::NOT_FOUND, format!("No data found for '{key}'.")).into_response()
        }
    }
}

async fn search_handler(State(state): State<Arc<AppState>>, Path(raw): Path<String>) -> Response {
    let query = raw.trim();
    if query.is_empty() {
        return (StatusCode::BAD_REQUEST, "Query is required.").into_response();
    }

    let gate = state.hub.hub().gate();
    match gate.run(state.search.search(query)).await {
        Ok(Ok(results)) => (StatusCode::OK, Json(results)).into_response(),
        Ok(Err(e)) if e.is_not_found() => (StatusCode::OK, Json(Vec::<SearchResult>::new())).into_response(),
        Ok(Err(e)) => {
            tracing::warn!(query, error = %e, "Search failed");
            (StatusCode::BAD_GATEWAY, "Search failed.").into_response()
        }
        Err(e) => {
            tracing::warn!(query, error = %e, "Search timed out");
            (StatusCode::GATEWAY_TIMEOUT, "Search timed out.").into_response()
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
