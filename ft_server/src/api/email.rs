//! Email confirmation handlers.

use axum::{Json, extract::State};
use serde::Deserialize;

use super::{
    AppState,
    error::{ApiError, MessageResponse},
    middleware::CurrentUser,
};

#[derive(Debug, Deserialize)]
pub struct EmailConfirmationRequest {
    pub email: String,
    pub confirmation_token: String,
}

/// Confirm an email address with the token from the confirmation link.
///
/// `400 Bad Request` when the token is unknown, already used or expired.
pub async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<EmailConfirmationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .confirm_email(&request.email, &request.confirmation_token)
        .await?;

    Ok(Json(MessageResponse::new("Email confirmed")))
}

/// Send a fresh confirmation link to the authenticated user.
///
/// `429 Too Many Requests` while the previous link is still valid,
/// `400 Bad Request` when the address is already confirmed.
pub async fn resend(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.auth.user_by_email(&current.email).await?;

    state.auth.resend_confirmation(&user).await?;

    Ok(Json(MessageResponse::new(
        "If the account exists, the email has been re-sent",
    )))
}
