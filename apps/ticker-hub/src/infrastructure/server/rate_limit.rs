//! Per-IP request limiting for the public routes.
//!
//! A GCRA limiter keyed by client IP. The allowance refills evenly over the
//! window, with a burst of the full request count.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use super::AppState;
use crate::infrastructure::config::RateLimitSettings;
use crate::infrastructure::metrics;

/// Request limiter keyed by client IP.
pub struct IpRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl std::fmt::Debug for IpRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpRateLimiter")
            .field("tracked", &self.tracked())
            .finish_non_exhaustive()
    }
}

impl IpRateLimiter {
    /// Build a limiter allowing `requests` per `window` for each IP.
    #[must_use]
    pub fn new(settings: &RateLimitSettings) -> Self {
        let burst = NonZeroU32::new(settings.requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(settings.window / burst.get())
            .map_or_else(|| Quota::per_second(burst), |q| q.allow_burst(burst));

        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Take one request from `ip`'s allowance.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    /// Forget IPs whose allowance has fully refilled.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// IPs currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

/// Middleware rejecting requests over the caller's allowance with 429.
///
/// Requests without connection info share the unspecified address.
pub(crate) async fn limit_by_ip(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip());

    if !state.rate_limiter.check(ip) {
        tracing::debug!(%ip, path = %request.uri().path(), "Rate limited");
        metrics::record_rate_limited();
        return (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
    }
    next.run(request).await
}
