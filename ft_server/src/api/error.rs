//! Mapping from core errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fintrack::AuthError;
use serde::{Deserialize, Serialize};

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Success response body carrying a human-readable message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

/// HTTP status for an auth error
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials
        | AuthError::InvalidToken
        | AuthError::ExpiredToken
        | AuthError::AccessTokenNotFound
        | AuthError::RefreshTokenNotFound => StatusCode::UNAUTHORIZED,
        AuthError::EmailNotConfirmed => StatusCode::FORBIDDEN,
        AuthError::UserNotFound(_) => StatusCode::NOT_FOUND,
        AuthError::TooEarlyResend => StatusCode::TOO_MANY_REQUESTS,
        AuthError::UserAlreadyExists(_)
        | AuthError::InvalidEmail(_)
        | AuthError::PasswordValidation(_)
        | AuthError::InvalidPasswordResetToken
        | AuthError::PasswordIdenticalToPrevious
        | AuthError::InvalidOrExpiredEmailToken
        | AuthError::EmailAlreadyConfirmed => StatusCode::BAD_REQUEST,
        AuthError::Database(_)
        | AuthError::KeyValue(_)
        | AuthError::HashingFailed
        | AuthError::TokenSigning(_)
        | AuthError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_internal() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            error: self.0.client_message(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintrack::kv::KvError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&AuthError::UserAlreadyExists("a@b.c".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AuthError::InvalidEmail("Invalid email address format".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AuthError::PasswordValidation(vec!["too short".into()])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&AuthError::ExpiredToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(&AuthError::AccessTokenNotFound),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_for(&AuthError::EmailNotConfirmed), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&AuthError::UserNotFound("a@b.c".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AuthError::TooEarlyResend),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&AuthError::KeyValue(KvError::WrongType("k".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        let response = ApiError(AuthError::TokenSigning("bad pem".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
