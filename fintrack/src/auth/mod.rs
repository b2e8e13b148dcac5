//! Authentication and session-token lifecycle.
//!
//! - Argon2id password hashing with configurable cost
//! - Password policy with four strictness levels
//! - Asymmetric JWT access, refresh and password-reset tokens
//! - Revocable refresh sessions tracked in a key/value store
//! - Access tokens watermarked with the user's last password reset, so a
//!   reset invalidates every access token issued before it
//!
//! ## Example
//!
//! ```no_run
//! use fintrack::auth::{
//!     Algorithm, AuthManager, AuthSettings, LoginRequest, PasswordHandler, PasswordPolicyLevel,
//!     PasswordValidator, RefreshTokenStore, TokenIssuer, TokenLifetimes,
//! };
//! use fintrack::db::MemoryUserRepository;
//! use fintrack::email::{EmailQueue, LogSender, Mailer, RetryPolicy, TemplateRenderer};
//! use fintrack::kv::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tokens = TokenIssuer::from_files(
//!         Algorithm::RS256,
//!         "keys/private.pem",
//!         "keys/public.pem",
//!         TokenLifetimes::default(),
//!     )?;
//!     let (queue, worker) = EmailQueue::start(Arc::new(LogSender), RetryPolicy::default(), 64);
//!
//!     let auth = AuthManager::new(
//!         Arc::new(MemoryUserRepository::new()),
//!         RefreshTokenStore::new(Arc::new(MemoryStore::new())),
//!         Arc::new(tokens),
//!         PasswordHandler::default(),
//!         Arc::new(PasswordValidator::new(PasswordPolicyLevel::Medium)),
//!         Mailer::new(TemplateRenderer::builtin(), queue),
//!         AuthSettings::default(),
//!     );
//!
//!     let session = auth
//!         .login(LoginRequest {
//!             email: "ann@example.com".to_string(),
//!             password: "Secret#Pass1".to_string(),
//!         })
//!         .await?;
//!     let user = auth.authenticate(&session.access_token).await?;
//!     println!("Logged in as {}", user.email);
//!
//!     worker.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod password;
pub mod refresh_store;
pub mod tokens;
pub mod validator;

pub use errors::{AuthError, AuthResult};
pub use manager::{AuthManager, AuthSettings};
pub use models::{
    LoginRequest, NewUser, RefreshToken, RegisterRequest, SessionTokens, TokenClaims, TokenKind,
    User, UserId, UserProfile, UserUpdate,
};
pub use password::PasswordHandler;
pub use refresh_store::RefreshTokenStore;
pub use tokens::{Algorithm, TokenIssuer, TokenLifetimes};
pub use validator::{PasswordPolicyLevel, PasswordValidator, validate_email};
