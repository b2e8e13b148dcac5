//! Request extractors for protected endpoints.
//!
//! [`CurrentUser`] authenticates the caller from the `access_token` cookie,
//! falling back to an `Authorization: Bearer <token>` header, and rejects the
//! request with `401` before the handler runs.
//!
//! ```rust,no_run
//! use axum::Json;
//! use ft_server::api::middleware::CurrentUser;
//!
//! async fn whoami(CurrentUser(user): CurrentUser) -> Json<String> {
//!     Json(user.email)
//! }
//! # let _ = whoami;
//! ```

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use fintrack::auth::{AuthError, User};
use std::{convert::Infallible, net::SocketAddr};

use super::{AppState, cookies::ACCESS_TOKEN_COOKIE, error::ApiError};

/// Authenticated user behind the request's access token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers).ok_or(AuthError::AccessTokenNotFound)?;
        let user = state.auth.authenticate(&token).await?;
        Ok(CurrentUser(user))
    }
}

/// Best-effort client identity: first `X-Forwarded-For` hop, then the peer address
pub fn client_key(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(client) = forwarded {
        return client.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Client address of the request, see [`client_key`]
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(client_key(&parts.headers, &parts.extensions)))
    }
}
