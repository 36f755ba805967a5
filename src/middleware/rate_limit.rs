//! Login throttling middleware.
//!
//! Fixed-window counter of sign-in attempts per client IP. Successful
//! sign-ins count too, so one valid account cannot be used to keep the
//! window open for guesses against another.

use crate::auth::error::AuthApiError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Configuration for login throttling.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Attempts allowed per window.
    pub max_attempts: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Attempt counters per IP.
#[derive(Clone)]
pub struct LoginThrottle {
    config: ThrottleConfig,
    state: Arc<Mutex<HashMap<IpAddr, AttemptWindow>>>,
}

struct AttemptWindow {
    attempts: u32,
    window_start: Instant,
}

impl LoginThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count an attempt. Returns how long to wait when over the limit.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut state = self.state.lock();
        let entry = state.entry(ip).or_insert(AttemptWindow {
            attempts: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.attempts = 0;
            entry.window_start = now;
        }

        entry.attempts += 1;
        if entry.attempts > self.config.max_attempts {
            let reset_at = entry.window_start + self.config.window;
            return Err(reset_at.saturating_duration_since(now));
        }
        Ok(())
    }

    /// Periodic cleanup of stale windows (call from a background task).
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window;
        self.state
            .lock()
            .retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }
}

/// Throttle middleware for the login route.
///
/// Requests without connection info (in-process tests, some proxies) share
/// one bucket keyed by the unspecified address.
pub async fn login_throttle(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(throttle): State<LoginThrottle>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let Err(retry_after) = throttle.check(ip) {
        warn!(
            ip = %ip,
            retry_after_secs = retry_after.as_secs(),
            "Login attempts throttled"
        );
        return AuthApiError::TooManyAttempts {
            retry_after_secs: retry_after.as_secs().max(1),
        }
        .into_response();
    }

    next.run(request).await
}
