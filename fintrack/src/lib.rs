//! # FinTrack
//!
//! Authentication and session core of the FinTrack personal-finance backend.
//!
//! ## Core Modules
//!
//! - [`auth`]: Registration, login, refresh, logout, password reset, email
//!   confirmation and access-token authentication
//! - [`db`]: User persistence (PostgreSQL and in-memory)
//! - [`kv`]: Key/value store used for refresh sessions (Redis and in-memory)
//! - [`email`]: Templates, SMTP delivery and the background delivery queue
//!
//! Every workflow lives on [`auth::AuthManager`], which receives its stores
//! and collaborators through trait objects so the whole core runs against
//! in-memory backends in tests.

/// Authentication workflows, tokens and password handling.
pub mod auth;

/// User record persistence.
pub mod db;

/// Outgoing email.
pub mod email;

/// Key/value store abstraction.
pub mod kv;

pub use auth::{AuthError, AuthManager, AuthResult, AuthSettings};
