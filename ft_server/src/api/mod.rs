//! HTTP API of the FinTrack authentication server.
//!
//! # Modules
//!
//! - [`auth`]: Registration, login, refresh, logout and password reset
//! - [`email`]: Email confirmation and confirmation resend
//! - [`users`]: Profile of the authenticated user
//! - [`middleware`]: Extractors for the authenticated user and client address
//! - [`rate_limiter`]: Per-route, per-client request budgets
//! - [`request_id`]: Request correlation and HTTP metrics
//!
//! # Endpoints Overview
//!
//! ```text
//! POST /auth/register          - Register user (201)
//! POST /auth/login             - Login, sets session cookies
//! POST /auth/refresh           - New access token from the refresh cookie
//! POST /auth/logout            - Revoke session, clear cookies
//! POST /auth/forgot-password   - Send password-reset email
//! POST /auth/reset-password    - Set a new password with a reset token
//! POST /email/confirm          - Confirm email address
//! POST /email/resend           - Resend confirmation (auth required)
//! GET  /users/profile          - Current user's profile (auth required)
//! GET  /health                 - Database and key/value store status
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ft_server::api::{AppState, create_router};
//! # use ft_server::config::HttpConfig;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let state: AppState = unimplemented!();
//! # let http: HttpConfig = unimplemented!();
//!
//! let app = create_router(state, &http);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cookies;
pub mod email;
pub mod error;
pub mod middleware;
pub mod rate_limiter;
pub mod request_id;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use fintrack::{auth::AuthManager, db::Database, kv::KeyValueStore};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, CorsLayer};

use crate::config::HttpConfig;
use cookies::CookieSettings;
use rate_limiter::RouteRateLimiter;

/// Application state shared across all HTTP handlers.
///
/// This state is cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthManager>,
    /// Session store, pinged by the health check
    pub kv: Arc<dyn KeyValueStore>,
    /// PostgreSQL pool; `None` when users live in memory
    pub database: Option<Database>,
    pub cookies: CookieSettings,
}

/// Create the API router with all endpoints and middleware.
///
/// Rate limiting is installed per route when enabled in `http`; CORS allows
/// credentialed requests from the configured frontend origin only.
pub fn create_router(state: AppState, http: &HttpConfig) -> Router {
    let mut api_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/email/confirm", post(email::confirm))
        .route("/email/resend", post(email::resend))
        .route("/users/profile", get(users::profile));

    if http.rate_limiter_enabled {
        let limiter = Arc::new(RouteRateLimiter::with_default_limits());
        api_routes = api_routes.route_layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limiter::rate_limit_middleware,
        ));
    }

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(cors_layer(&http.allowed_hosts))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([header::HeaderName::from_static(request_id::REQUEST_ID_HEADER)])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = origin, "Invalid CORS origin, cross-origin requests disabled");
            cors
        }
    }
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if all components are healthy, or `503 Service
/// Unavailable` if any component fails. `database` is `null` when no
/// PostgreSQL pool is configured.
///
/// ```bash
/// curl http://localhost:8000/health
/// # {"status":"healthy","database":true,"kv":true,"timestamp":"2026-10-16T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => Some(db.health_check().await.is_ok()),
        None => None,
    };
    let kv_healthy = state.kv.ping().await.is_ok();

    let overall_healthy = kv_healthy && db_healthy.unwrap_or(true);

    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "kv": kv_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
