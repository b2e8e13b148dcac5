//! Prometheus metrics.
//!
//! Counters are recorded through the `metrics` facade and exported on a
//! separate listener when `METRICS_BIND` is configured. Without an installed
//! recorder every call is a no-op.
//!
//! ```rust,no_run
//! use ft_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/auth/login", 200);
//! ```

use async_trait::async_trait;
use fintrack::email::{EmailResult, EmailSender};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::Arc};

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Increments the total HTTP request counter with method, path, and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment login attempts counter.
pub fn login_attempts_total(success: bool) {
    metrics::counter!("login_attempts_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(endpoint: &str) {
    metrics::counter!("rate_limit_hits_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

// ============================================================================
// Email Metrics
// ============================================================================

/// Increment email delivery attempts counter.
pub fn email_deliveries_total(success: bool) {
    metrics::counter!("email_deliveries_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Sender wrapper counting every delivery attempt
pub struct MeteredSender {
    inner: Arc<dyn EmailSender>,
}

impl MeteredSender {
    pub fn new(inner: Arc<dyn EmailSender>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EmailSender for MeteredSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> EmailResult<()> {
        let result = self.inner.send(to, subject, html).await;
        email_deliveries_total(result.is_ok());
        result
    }
}
