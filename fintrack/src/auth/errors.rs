//! Authentication error types.

use thiserror::Error;

use crate::kv::KvError;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Key/value store error
    #[error("Key/value store error: {0}")]
    KeyValue(#[from] KvError),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Token could not be signed
    #[error("Token signing failed: {0}")]
    TokenSigning(String),

    /// Invalid auth configuration (keys, algorithm, policy level)
    #[error("Invalid auth configuration: {0}")]
    Configuration(String),

    /// Malformed email address
    #[error("{0}")]
    InvalidEmail(String),

    /// Email already registered
    #[error("User with email {0} already exists")]
    UserAlreadyExists(String),

    /// Password policy violations
    #[error("Password does not meet requirements: {}", .0.join("; "))]
    PasswordValidation(Vec<String>),

    /// Wrong email or password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Login blocked until the email is confirmed
    #[error("Email address is not confirmed")]
    EmailNotConfirmed,

    /// Bad signature, malformed payload or missing claims
    #[error("Invalid token")]
    InvalidToken,

    /// Token is past its expiry
    #[error("Token has expired")]
    ExpiredToken,

    /// Referenced user no longer exists
    #[error("User {0} not found")]
    UserNotFound(String),

    /// Reset token does not match the stored one
    #[error("Invalid or expired password reset token")]
    InvalidPasswordResetToken,

    /// New password equals the current one
    #[error("New password must differ from the current password")]
    PasswordIdenticalToPrevious,

    /// Access token cookie missing
    #[error("Access token not found")]
    AccessTokenNotFound,

    /// Refresh token cookie missing
    #[error("Refresh token not found")]
    RefreshTokenNotFound,

    /// Confirmation token unknown, consumed or expired
    #[error("Invalid or expired email confirmation token")]
    InvalidOrExpiredEmailToken,

    /// Confirmation requested for a confirmed account
    #[error("Email address is already confirmed")]
    EmailAlreadyConfirmed,

    /// Confirmation resend requested while the previous token is still valid
    #[error("Confirmation email was sent recently, please try again later")]
    TooEarlyResend,
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Infrastructure errors are sanitized to prevent information disclosure
    /// about the internal system structure.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Database(_)
            | AuthError::KeyValue(_)
            | AuthError::HashingFailed
            | AuthError::TokenSigning(_)
            | AuthError::Configuration(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the error originates from infrastructure rather than from the caller
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Database(_)
                | AuthError::KeyValue(_)
                | AuthError::HashingFailed
                | AuthError::TokenSigning(_)
                | AuthError::Configuration(_)
        )
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
