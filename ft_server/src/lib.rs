//! # FinTrack server
//!
//! HTTP transport for the FinTrack authentication core: routes, cookies,
//! rate limiting, configuration loading and the logging/metrics bootstrap.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
