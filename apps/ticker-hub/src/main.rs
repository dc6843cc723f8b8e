//! Ticker Hub Binary
//!
//! Starts the demand-driven quote feed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-hub
//! ```
//!
//! # Environment Variables
//!
//! All optional.
//! - `PORT`: HTTP + WebSocket port (default: 8084)
//! - `POLL_INTERVAL_MS`: Poll cycle period (default: 5000)
//! - `POLL_WORKERS`: Concurrent fetch ceiling (default: 10)
//! - `FETCH_TIMEOUT_SECS`: Per-fetch timeout (default: 15)
//! - `WS_CLIENT_SEND_BUFFER`: Per-client outbound queue (default: 256)
//! - `WS_PONG_WAIT_SECS` / `WS_WRITE_WAIT_SECS`: Session deadlines (default: 60 / 10)
//! - `FINANCE_BASE_URL`: Quote page origin (default: <https://www.google.com/finance>)
//! - `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_WINDOW_SECS`: Per-IP limit (default: 30 per 60)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ticker_hub::application::services::{Hub, coordinator};
use ticker_hub::infrastructure::fetcher::GoogleFinanceFetcher;
use ticker_hub::infrastructure::server::{AppState, HttpServer};
use ticker_hub::infrastructure::telemetry;
use ticker_hub::{TickerHubConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_ancestors();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Ticker Hub");

    let _metrics_handle = init_metrics();

    let config = TickerHubConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let fetcher = GoogleFinanceFetcher::new(&config.fetcher, config.poll.fetch_timeout)
        .context("failed to build quote fetcher")?;
    let fetcher = Arc::new(fetcher);
    let hub = Hub::new(fetcher.clone(), config.hub());
    let (handle, coordinator_task) = coordinator::spawn(hub, shutdown_token.clone());

    let state = Arc::new(AppState::new(
        handle,
        fetcher,
        config.websocket.clone(),
        &config.rate_limit,
        env!("CARGO_PKG_VERSION").to_string(),
    ));
    let server = HttpServer::new(config.server.port, state, shutdown_token.clone());
    let server_token = shutdown_token.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "HTTP server error");
            server_token.cancel();
        }
    });

    tracing::info!("Ticker hub ready");

    tokio::select! {
        () = await_shutdown_signal() => shutdown_token.cancel(),
        () = shutdown_token.cancelled() => {}
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = coordinator_task.await;
        let _ = server_task.await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Shutdown timed out, exiting");
    }

    tracing::info!("Ticker hub stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &TickerHubConfig) {
    tracing::info!(
        port = config.server.port,
        poll_interval_ms = config.poll.interval.as_millis(),
        workers = config.poll.workers,
        fetch_timeout_secs = config.poll.fetch_timeout.as_secs(),
        rate_limit_requests = config.rate_limit.requests,
        rate_limit_window_secs = config.rate_limit.window.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(
        base_url = %config.fetcher.base_url,
        client_send_buffer = config.websocket.client_send_buffer,
        max_message_size = config.websocket.max_message_size,
        pong_wait_secs = config.websocket.pong_wait.as_secs(),
        "Session settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
