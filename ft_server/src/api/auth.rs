//! Authentication API handlers.
//!
//! Session tokens travel in `HttpOnly` cookies; the access token is also
//! echoed in the JSON body of login and refresh.
//!
//! # Examples
//!
//! Register a new user:
//! ```bash
//! curl -X POST http://localhost:8000/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "ann@example.com", "password": "Str0ng#Passw0rd", "first_name": "Ann", "last_name": "Lee", "birthday": "1990-04-01"}'
//! ```
//!
//! Login:
//! ```bash
//! curl -c cookies.txt -X POST http://localhost:8000/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "ann@example.com", "password": "Str0ng#Passw0rd"}'
//! ```

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use fintrack::auth::{AuthError, LoginRequest, RegisterRequest};
use serde::{Deserialize, Serialize};

use super::{
    AppState,
    cookies::{REFRESH_TOKEN_COOKIE, clear_auth_tokens},
    error::{ApiError, MessageResponse},
    middleware::ClientAddr,
    request_id::RequestId,
};
use crate::{logging, metrics};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

fn refresh_cookie(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Register a new user account.
///
/// # Responses
///
/// - `201 Created`: Account created; mentions the confirmation email when one was sent
/// - `400 Bad Request`: Email taken or password rejected by the policy
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let user = state.auth.register(request).await?;

    let mut message = format!("User {} created successfully.", user.email);
    if !user.email_confirmed {
        message.push_str(" A confirmation email has been sent to your address.");
    }

    Ok((StatusCode::CREATED, Json(MessageResponse::new(message))))
}

/// Log in with email and password.
///
/// Sets the `access_token` and `refresh_token` cookies.
///
/// # Responses
///
/// - `200 OK`: `{"access_token": "...", "token_type": "bearer"}`
/// - `401 Unauthorized`: Wrong email or password
/// - `403 Forbidden`: Email not confirmed yet
pub async fn login(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    request_id: RequestId,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let email = request.email.clone();

    let session = match state.auth.login(request).await {
        Ok(session) => session,
        Err(err) => {
            metrics::login_attempts_total(false);
            if !err.is_internal() {
                logging::log_security_event(
                    "failed_login",
                    Some(&email),
                    Some(&client),
                    &format!("{} (request {})", err, request_id.as_str()),
                );
            }
            return Err(err.into());
        }
    };
    metrics::login_attempts_total(true);

    let jar = state
        .cookies
        .set_auth_tokens(jar, &session.access_token, &session.refresh_token);

    Ok((jar, Json(TokenResponse::bearer(session.access_token))))
}

/// Issue a new access token from the `refresh_token` cookie.
///
/// Both cookies are set again; the refresh token itself is not rotated.
///
/// # Responses
///
/// - `200 OK`: `{"access_token": "...", "token_type": "bearer"}`
/// - `401 Unauthorized`: Cookie missing, token invalid, expired or revoked
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let refresh_token = refresh_cookie(&jar).ok_or(AuthError::RefreshTokenNotFound)?;

    let access_token = state.auth.refresh(&refresh_token).await?;

    let jar = state
        .cookies
        .set_auth_tokens(jar, &access_token, &refresh_token);

    Ok((jar, Json(TokenResponse::bearer(access_token))))
}

/// Revoke the session behind the `refresh_token` cookie and clear both cookies.
///
/// # Responses
///
/// - `200 OK`: Logged out
/// - `400 Bad Request`: No refresh cookie
/// - `401 Unauthorized`: Refresh token invalid or expired
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<Response, ApiError> {
    let Some(refresh_token) = refresh_cookie(&jar) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(MessageResponse::new("No refresh token")),
        )
            .into_response());
    };

    state.auth.logout(&refresh_token).await?;

    Ok((
        clear_auth_tokens(jar),
        Json(MessageResponse::new("Logged out")),
    )
        .into_response())
}

/// Request a password-reset email.
///
/// Always answers `200 OK` so the endpoint cannot be used to probe for accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.forgot_password(&request.email).await?;

    Ok(Json(MessageResponse::new(
        "If the account exists, an email has been sent",
    )))
}

/// Set a new password using the token from the reset email.
///
/// Every session of the user is revoked.
///
/// # Responses
///
/// - `200 OK`: Password changed
/// - `400 Bad Request`: Token already used or superseded, password rejected
/// - `401 Unauthorized`: Token invalid or expired
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .reset_password(&request.token, &request.new_password)
        .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}
