//! Configuration Module
//!
//! Environment-driven configuration for the ticker hub.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_USER_AGENT, FetcherSettings, PollSettings, RateLimitSettings, ServerSettings,
    TickerHubConfig, WebSocketSettings,
};
