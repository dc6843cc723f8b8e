//! Hub Configuration Settings
//!
//! Configuration types for the ticker hub, loaded from environment variables.
//! Unparsable values fall back to defaults; values that would disable the hub
//! (zero workers, zero queue capacity, zero intervals) are rejected.

use std::time::Duration;

use crate::application::services::HubConfig;

/// Default User-Agent sent to the quote source.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// HTTP + WebSocket listen port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 8084 }
    }
}

/// Polling and fetch concurrency settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Period between poll cycles.
    pub interval: Duration,
    /// Worker Pool Gate width.
    pub workers: usize,
    /// Upper bound on a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        let hub = HubConfig::default();
        Self {
            interval: hub.poll_interval,
            workers: hub.workers,
            fetch_timeout: hub.fetch_timeout,
        }
    }
}

/// WebSocket session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketSettings {
    /// Per-client outbound queue capacity.
    pub client_send_buffer: usize,
    /// Transport read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Transport write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Largest inbound message accepted.
    pub max_message_size: usize,
    /// Read deadline, extended by every pong.
    pub pong_wait: Duration,
    /// Deadline for a single write.
    pub write_wait: Duration,
}

impl WebSocketSettings {
    /// Ping interval: nine tenths of the read deadline.
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            client_send_buffer: HubConfig::default().client_queue_capacity,
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            max_message_size: 4096,
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

/// Per-IP HTTP rate limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Requests allowed per client IP within one window.
    pub requests: u32,
    /// Window the request allowance refills over.
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests: 30,
            window: Duration::from_secs(60),
        }
    }
}

/// Quote source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherSettings {
    /// Origin of the quote pages.
    pub base_url: String,
    /// User-Agent header.
    pub user_agent: String,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.google.com/finance".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Complete hub configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerHubConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// Polling settings.
    pub poll: PollSettings,
    /// WebSocket session settings.
    pub websocket: WebSocketSettings,
    /// Quote source settings.
    pub fetcher: FetcherSettings,
    /// Per-IP HTTP rate limit.
    pub rate_limit: RateLimitSettings,
}

impl TickerHubConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but invalid.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource(lookup);
        let defaults = Self::default();

        let server = ServerSettings {
            port: env.parse("PORT", defaults.server.port),
        };

        let poll = PollSettings {
            interval: env.millis("POLL_INTERVAL_MS", defaults.poll.interval),
            workers: env.parse("POLL_WORKERS", defaults.poll.workers),
            fetch_timeout: env.secs("FETCH_TIMEOUT_SECS", defaults.poll.fetch_timeout),
        };

        let websocket = WebSocketSettings {
            client_send_buffer: env.parse(
                "WS_CLIENT_SEND_BUFFER",
                defaults.websocket.client_send_buffer,
            ),
            read_buffer_size: env.parse("WS_READ_BUFFER_SIZE", defaults.websocket.read_buffer_size),
            write_buffer_size: env.parse(
                "WS_WRITE_BUFFER_SIZE",
                defaults.websocket.write_buffer_size,
            ),
            max_message_size: env.parse("WS_MAX_MESSAGE_SIZE", defaults.websocket.max_message_size),
            pong_wait: env.secs("WS_PONG_WAIT_SECS", defaults.websocket.pong_wait),
            write_wait: env.secs("WS_WRITE_WAIT_SECS", defaults.websocket.write_wait),
        };

        let fetcher = FetcherSettings {
            base_url: env
                .string("FINANCE_BASE_URL")
                .unwrap_or(defaults.fetcher.base_url),
            user_agent: env
                .string("FETCH_USER_AGENT")
                .unwrap_or(defaults.fetcher.user_agent),
        };

        let rate_limit = RateLimitSettings {
            requests: env.parse("RATE_LIMIT_REQUESTS", defaults.rate_limit.requests),
            window: env.secs("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window),
        };

        let config = Self {
            server,
            poll,
            websocket,
            fetcher,
            rate_limit,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("POLL_INTERVAL_MS", self.poll.interval.is_zero()),
            ("POLL_WORKERS", self.poll.workers == 0),
            ("FETCH_TIMEOUT_SECS", self.poll.fetch_timeout.is_zero()),
            ("WS_CLIENT_SEND_BUFFER", self.websocket.client_send_buffer == 0),
            ("WS_MAX_MESSAGE_SIZE", self.websocket.max_message_size == 0),
            ("WS_PONG_WAIT_SECS", self.websocket.pong_wait.is_zero()),
            ("WS_WRITE_WAIT_SECS", self.websocket.write_wait.is_zero()),
            ("RATE_LIMIT_REQUESTS", self.rate_limit.requests == 0),
            ("RATE_LIMIT_WINDOW_SECS", self.rate_limit.window.is_zero()),
        ];
        if let Some((key, _)) = checks.iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::MustBePositive((*key).to_string()));
        }

        let base = self.fetcher.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::EmptyValue("FINANCE_BASE_URL".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(base.to_string()));
        }
        Ok(())
    }

    /// Hub tuning derived from these settings.
    #[must_use]
    pub const fn hub(&self) -> HubConfig {
        HubConfig {
            poll_interval: self.poll.interval,
            workers: self.poll.workers,
            fetch_timeout: self.poll.fetch_timeout,
            client_queue_capacity: self.websocket.client_send_buffer,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Value must be greater than zero.
    #[error("environment variable {0} must be greater than zero")]
    MustBePositive(String),
    /// Base URL is not an http(s) URL.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

struct EnvSource<F>(F);

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
