//! Structured logging configuration.
//!
//! Installs the tracing subscriber and provides helpers for security events
//! and request logging. Records emitted through the `log` facade by the
//! `fintrack` library are bridged into the same subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use ft_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `email` - Account the event concerns, if known
/// * `client` - Client address
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use ft_server::logging::log_security_event;
///
/// log_security_event(
///     "failed_login",
///     Some("ann@example.com"),
///     Some("192.168.1.1"),
///     "Invalid email or password",
/// );
/// ```
pub fn log_security_event(
    event_type: &str,
    email: Option<&str>,
    client: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        email = email,
        client = client,
        "SECURITY: {}",
        message
    );
}

/// Log a completed API request
pub fn log_api_request(
    request_id: &str,
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
) {
    tracing::info!(
        request_id = request_id,
        http_method = method,
        http_path = path,
        http_status = status_code,
        duration_ms = duration_ms,
        "Request completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_security_event() {
        log_security_event("test_event", Some("ann@example.com"), Some("127.0.0.1"), "Test");
        log_security_event("test_event", None, None, "Test");
    }

    #[test]
    fn test_log_api_request() {
        log_api_request("req-1", "POST", "/auth/login", 200, 45);
        log_api_request("req-2", "GET", "/users/profile", 401, 3);
    }
}
