//! Per-client request rate limiting.
//!
//! Each route has its own sliding-window budget, tracked separately for every
//! client address. Exceeding it yields `429 Too Many Requests` with a
//! `Retry-After` header.

use axum::{
    Json,
    extract::{MatchedPath, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use super::{error::ErrorResponse, middleware::client_key};
use crate::{logging, metrics};

/// Number of tracked (route, client) windows above which idle ones are evicted
const MAX_TRACKED_WINDOWS: usize = 10_000;

const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later";

/// Rate limiter using a sliding window algorithm
#[derive(Debug)]
pub struct RateLimiter {
    /// Timestamps of recent requests
    timestamps: VecDeque<Instant>,
    /// Maximum number of requests allowed in the window
    max_requests: usize,
    /// Time window for rate limiting
    window: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Example
    ///
    /// ```
    /// use ft_server::api::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// // Allow 5 requests per minute
    /// let limiter = RateLimiter::new(5, Duration::from_secs(60));
    /// ```
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(max_requests),
            max_requests,
            window,
        }
    }

    /// Check if a request should be allowed
    ///
    /// Returns `true` if the request is allowed, `false` if rate limit exceeded.
    ///
    /// # Example
    ///
    /// ```
    /// # use ft_server::api::rate_limiter::RateLimiter;
    /// # use std::time::Duration;
    /// let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
    ///
    /// assert!(limiter.check());
    /// assert!(limiter.check());
    /// assert!(!limiter.check());
    /// ```
    pub fn check(&mut self) -> bool {
        let now = Instant::now();
        self.evict_expired(now);

        if self.timestamps.len() >= self.max_requests {
            return false;
        }

        self.timestamps.push_back(now);
        true
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(ts) = self.timestamps.front() {
            if now.duration_since(*ts) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Get the time until the window resets (when the oldest request expires)
    ///
    /// Returns `None` if there are no requests in the current window.
    pub fn reset_in(&self) -> Option<Duration> {
        self.timestamps.front().map(|oldest| {
            let elapsed = Instant::now().duration_since(*oldest);
            self.window.saturating_sub(elapsed)
        })
    }

    /// True when every recorded request has left the window
    fn is_idle(&mut self) -> bool {
        self.evict_expired(Instant::now());
        self.timestamps.is_empty()
    }
}

/// Request budget of one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLimit {
    pub max_requests: usize,
    pub window: Duration,
}

impl RouteLimit {
    pub const fn per_minute(max_requests: usize) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

/// Sliding-window limiter keyed by route and client
#[derive(Debug, Default)]
pub struct RouteRateLimiter {
    limits: HashMap<String, RouteLimit>,
    windows: Mutex<HashMap<(String, String), RateLimiter>>,
}

impl RouteRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Budgets for the public API
    pub fn with_default_limits() -> Self {
        Self::new()
            .limit("/auth/register", RouteLimit::per_minute(2))
            .limit("/auth/login", RouteLimit::per_minute(5))
            .limit("/auth/refresh", RouteLimit::per_minute(10))
            .limit("/auth/forgot-password", RouteLimit::per_minute(2))
            .limit("/auth/reset-password", RouteLimit::per_minute(5))
            .limit("/email/confirm", RouteLimit::per_minute(5))
            .limit("/email/resend", RouteLimit::per_minute(2))
            .limit("/users/profile", RouteLimit::per_minute(5))
    }

    /// Set the budget of a route
    pub fn limit(mut self, route: &str, limit: RouteLimit) -> Self {
        self.limits.insert(route.to_string(), limit);
        self
    }

    /// Record a request. Once the client's budget is spent, returns how long
    /// until the oldest request leaves the window. Routes without a budget
    /// are always allowed.
    pub fn check(&self, route: &str, client: &str) -> Result<(), Duration> {
        let Some(limit) = self.limits.get(route) else {
            return Ok(());
        };

        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= MAX_TRACKED_WINDOWS {
            windows.retain(|_, limiter| !limiter.is_idle());
        }

        let window = windows
            .entry((route.to_string(), client.to_string()))
            .or_insert_with(|| RateLimiter::new(limit.max_requests, limit.window));

        if window.check() {
            Ok(())
        } else {
            Err(window.reset_in().unwrap_or(limit.window))
        }
    }
}

/// Middleware enforcing the route budgets; must be installed with `route_layer`
/// so the matched route is known
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RouteRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let client = client_key(request.headers(), request.extensions());

    if let Err(retry_after) = limiter.check(&route, &client) {
        metrics::rate_limit_hits_total(&route);
        logging::log_security_event("rate_limited", None, Some(&client), &route);
        let body = ErrorResponse {
            error: RATE_LIMIT_MESSAGE.to_string(),
        };
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs(retry_after).to_string())],
            Json(body),
        )
            .into_response();
    }

    next.run(request).await
}

/// Whole seconds for `Retry-After`, rounded up and at least one
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
