//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult},
    models::{LoginRequest, NewUser, RegisterRequest, SessionTokens, TokenKind, User, UserUpdate},
    password::PasswordHandler,
    refresh_store::RefreshTokenStore,
    tokens::{TokenIssuer, TokenLifetimes},
    validator::{PasswordValidator, validate_email},
};
use crate::{
    db::UserRepository,
    email::{
        Mailer,
        templates::{CONFIRM_EMAIL_TEMPLATE, RESET_PASSWORD_TEMPLATE},
    },
};
use chrono::{Duration, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

const CONFIRM_EMAIL_SUBJECT: &str = "Confirm your registration";
const RESET_PASSWORD_SUBJECT: &str = "Password reset";

/// Workflow settings resolved from configuration
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Require a confirmed email before login
    pub email_confirmation_enabled: bool,
    /// Lifetime of a confirmation token, also the minimum gap between resends
    pub confirm_token_expiry: Duration,
    /// Frontend base URL used to build links in emails
    pub frontend_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            email_confirmation_enabled: false,
            confirm_token_expiry: Duration::hours(24),
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    sessions: RefreshTokenStore,
    tokens: Arc<TokenIssuer>,
    passwords: PasswordHandler,
    validator: Arc<PasswordValidator>,
    mailer: Mailer,
    settings: AuthSettings,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `users` - User record store
    /// * `sessions` - Refresh-token session store
    /// * `tokens` - JWT issuer
    /// * `passwords` - Password hasher
    /// * `validator` - Password policy
    /// * `mailer` - Outgoing email
    /// * `settings` - Workflow settings
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: RefreshTokenStore,
        tokens: Arc<TokenIssuer>,
        passwords: PasswordHandler,
        validator: Arc<PasswordValidator>,
        mailer: Mailer,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            passwords,
            validator,
            mailer,
            settings,
        }
    }

    /// Token lifetimes, used by the transport for cookie max-age
    pub fn token_lifetimes(&self) -> TokenLifetimes {
        self.tokens.lifetimes()
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Register a new user
    ///
    /// With email confirmation enabled the account starts unconfirmed and a
    /// confirmation link is queued for delivery.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidEmail` - Malformed email address
    /// * `AuthError::UserAlreadyExists` - Email already registered
    /// * `AuthError::PasswordValidation` - Password violates the policy
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<User> {
        validate_email(&request.email)?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            warn!("Registration rejected, email taken: {}", request.email);
            return Err(AuthError::UserAlreadyExists(request.email));
        }

        let violations = self.validator.validate(&request.password, Some(request.email.as_str()));
        if !violations.is_empty() {
            return Err(AuthError::PasswordValidation(violations));
        }

        let password_hash = self.passwords.hash(&request.password)?;

        let now = Utc::now();
        let mut new_user = NewUser {
            email: request.email,
            password_hash,
            first_name: request.first_name,
            last_name: request.last_name,
            birthday: Some(request.birthday),
            email_confirmed: true,
            email_confirmed_at: Some(now),
            confirmation_token: None,
            confirmation_token_created_at: None,
        };
        if self.settings.email_confirmation_enabled {
            new_user.email_confirmed = false;
            new_user.email_confirmed_at = None;
            new_user.confirmation_token = Some(Uuid::new_v4().to_string());
            new_user.confirmation_token_created_at = Some(now);
        }

        let user = self.users.create(new_user).await?;

        if let Some(token) = &user.confirmation_token {
            self.send_confirmation_email(&user.email, token);
        }

        info!("User {} registered (id={})", user.email, user.id);
        Ok(user)
    }

    /// Log in with email and password
    ///
    /// # Returns
    ///
    /// * `SessionTokens` - Access token (with password-reset watermark) and
    ///   a refresh token whose session is now live
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidEmail` - Malformed email address
    /// * `AuthError::InvalidCredentials` - Unknown email or wrong password
    /// * `AuthError::EmailNotConfirmed` - Confirmation required but missing
    pub async fn login(&self, request: LoginRequest) -> AuthResult<SessionTokens> {
        validate_email(&request.email)?;

        let Some(user) = self.users.find_by_email(&request.email).await? else {
            warn!("Login failed, unknown email: {}", request.email);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.passwords.verify(&request.password, &user.password_hash) {
            warn!("Login failed, wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        if self.settings.email_confirmation_enabled && !user.email_confirmed {
            return Err(AuthError::EmailNotConfirmed);
        }

        let access_token = self.tokens.create_access_token_with_watermark(
            user.id,
            &user.email,
            user.last_password_reset,
        )?;
        let refresh = self.tokens.create_refresh_token(user.id, &user.email)?;

        self.sessions
            .save(&refresh.jti, user.id, refresh.ttl_secs)
            .await?;

        self.users
            .update(
                user.id,
                UserUpdate {
                    last_login_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        info!("User {} logged in", user.id);
        Ok(SessionTokens {
            access_token,
            refresh_token: refresh.token,
        })
    }

    /// Exchange a live refresh token for a new access token.
    ///
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Bad token, not a refresh token, missing
    ///   claims or revoked session
    /// * `AuthError::ExpiredToken` - Token past its expiry
    /// * `AuthError::UserNotFound` - Session owner no longer exists
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<String> {
        let claims = self.tokens.decode_kind(refresh_token, TokenKind::Refresh)?;

        let (Some(user_id), Some(jti)) = (claims.user_id, claims.jti.as_deref()) else {
            return Err(AuthError::InvalidToken);
        };

        if self.sessions.get_user_id(jti).await? != Some(user_id) {
            warn!("Refresh rejected, session {} is not live", jti);
            return Err(AuthError::InvalidToken);
        }

        let user = self.users.find_by_id(user_id).await?.ok_or_else(|| {
            AuthError::UserNotFound(claims.sub.clone().unwrap_or_else(|| user_id.to_string()))
        })?;

        self.tokens
            .create_access_token_with_watermark(user.id, &user.email, user.last_password_reset)
    }

    /// Revoke the session behind a refresh token
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Bad token, not a refresh token or missing claims
    /// * `AuthError::ExpiredToken` - Token past its expiry
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let claims = self.tokens.decode_kind(refresh_token, TokenKind::Refresh)?;

        let (Some(user_id), Some(jti)) = (claims.user_id, claims.jti.as_deref()) else {
            return Err(AuthError::InvalidToken);
        };

        self.sessions.delete(jti, user_id).await?;
        info!("User {} logged out", user_id);
        Ok(())
    }

    /// Start a password reset.
    ///
    /// Unknown emails succeed silently so callers cannot probe for accounts.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidEmail` - Malformed email address
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        validate_email(email)?;

        let Some(user) = self.users.find_by_email(email).await? else {
            info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = self.tokens.create_reset_token(&user.email)?;

        self.users
            .update(
                user.id,
                UserUpdate {
                    password_reset_token: Some(Some(token.clone())),
                    password_reset_token_created_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await?;

        if let Some(link) = self.frontend_link("/reset-password", &[("token", token.as_str())]) {
            self.mailer.send_template(
                &user.email,
                RESET_PASSWORD_SUBJECT,
                RESET_PASSWORD_TEMPLATE,
                &[("reset_link", link.as_str())],
            );
        }

        info!("Password reset issued for user {}", user.id);
        Ok(())
    }

    /// Complete a password reset.
    ///
    /// On success the reset token is consumed, `last_password_reset` moves to
    /// now (invalidating older access tokens) and every refresh session of the
    /// user is revoked.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` / `AuthError::ExpiredToken` - Token failed verification
    /// * `AuthError::InvalidPasswordResetToken` - Not a reset token, or not the one on record
    /// * `AuthError::PasswordIdenticalToPrevious` - New password equals the old one
    /// * `AuthError::PasswordValidation` - New password violates the policy
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        let claims = self.tokens.decode(token)?;
        if claims.typ != TokenKind::Reset {
            warn!("Password reset rejected, {:?} token presented", claims.typ);
            return Err(AuthError::InvalidPasswordResetToken);
        }
        let email = claims.sub.ok_or(AuthError::InvalidPasswordResetToken)?;

        let user = self
            .users
            .find_by_email_and_reset_token(&email, token)
            .await?
            .ok_or_else(|| {
                warn!("Password reset rejected, token not on record");
                AuthError::InvalidPasswordResetToken
            })?;

        if self.passwords.verify(new_password, &user.password_hash) {
            return Err(AuthError::PasswordIdenticalToPrevious);
        }

        let violations = self.validator.validate(new_password, Some(user.email.as_str()));
        if !violations.is_empty() {
            return Err(AuthError::PasswordValidation(violations));
        }

        let password_hash = self.passwords.hash(new_password)?;

        self.users
            .update(
                user.id,
                UserUpdate {
                    password_hash: Some(password_hash),
                    password_reset_token: Some(None),
                    password_reset_token_created_at: Some(None),
                    last_password_reset: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        let revoked = self.sessions.delete_all_for_user(user.id).await?;
        info!(
            "Password reset for user {}, {} sessions revoked",
            user.id, revoked
        );
        Ok(())
    }

    /// Resolve the user behind an access token.
    ///
    /// Only access tokens are accepted. Tokens issued before the user's last
    /// password reset are rejected, as are tokens without a watermark once the
    /// user has reset at least once.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Bad token, not an access token, missing
    ///   claims or stale watermark
    /// * `AuthError::ExpiredToken` - Token past its expiry
    /// * `AuthError::UserNotFound` - User no longer exists
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<User> {
        let claims = self.tokens.decode_kind(access_token, TokenKind::Access)?;

        let (Some(email), Some(user_id)) = (claims.sub, claims.user_id) else {
            return Err(AuthError::InvalidToken);
        };

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound(email))?;

        if let Some(reset_at) = user.last_password_reset {
            let fresh = claims
                .pwd_reset_at
                .is_some_and(|issued_for| issued_for >= reset_at.timestamp());
            if !fresh {
                warn!("Stale access token for user {} rejected", user.id);
                return Err(AuthError::InvalidToken);
            }
        }

        Ok(user)
    }

    /// Look up a user by email
    ///
    /// # Errors
    ///
    /// * `AuthError::UserNotFound` - No such user
    pub async fn user_by_email(&self, email: &str) -> AuthResult<User> {
        self.users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(email.to_string()))
    }

    /// Confirm an email address with the token from the confirmation link
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidOrExpiredEmailToken` - No match, already
    ///   confirmed, or token older than the confirmation window
    pub async fn confirm_email(&self, email: &str, token: &str) -> AuthResult<()> {
        let user = self
            .users
            .find_by_email_and_confirmation_token(email, token)
            .await?
            .filter(|user| !user.email_confirmed)
            .ok_or(AuthError::InvalidOrExpiredEmailToken)?;

        let now = Utc::now();
        let within_window = user
            .confirmation_token_created_at
            .is_some_and(|created| now - created <= self.settings.confirm_token_expiry);
        if !within_window {
            return Err(AuthError::InvalidOrExpiredEmailToken);
        }

        let updated = self
            .users
            .update(
                user.id,
                UserUpdate {
                    email_confirmed: Some(true),
                    email_confirmed_at: Some(Some(now)),
                    confirmation_token: Some(None),
                    confirmation_token_created_at: Some(None),
                    ..Default::default()
                },
            )
            .await?;

        if updated.is_none() {
            error!("Email confirmation for {} could not update the user", email);
            return Err(AuthError::InvalidOrExpiredEmailToken);
        }

        info!("Email confirmed for user {}", user.id);
        Ok(())
    }

    /// Issue a fresh confirmation token and resend the confirmation email
    ///
    /// # Errors
    ///
    /// * `AuthError::EmailAlreadyConfirmed` - Nothing to confirm
    /// * `AuthError::TooEarlyResend` - Current token still within its window
    pub async fn resend_confirmation(&self, user: &User) -> AuthResult<()> {
        if user.email_confirmed {
            return Err(AuthError::EmailAlreadyConfirmed);
        }

        let now = Utc::now();
        if let Some(created) = user.confirmation_token_created_at
            && now - created < self.settings.confirm_token_expiry
        {
            return Err(AuthError::TooEarlyResend);
        }

        let token = Uuid::new_v4().to_string();
        self.users
            .update(
                user.id,
                UserUpdate {
                    confirmation_token: Some(Some(token.clone())),
                    confirmation_token_created_at: Some(Some(now)),
                    ..Default::default()
                },
            )
            .await?;

        self.send_confirmation_email(&user.email, &token);
        info!("Confirmation email re-sent for user {}", user.id);
        Ok(())
    }

    fn send_confirmation_email(&self, email: &str, token: &str) {
        let Some(link) =
            self.frontend_link("/email/confirm", &[("email", email), ("token", token)])
        else {
            return;
        };

        self.mailer.send_template(
            email,
            CONFIRM_EMAIL_SUBJECT,
            CONFIRM_EMAIL_TEMPLATE,
            &[("confirmation_link", link.as_str())],
        );
    }

    fn frontend_link(&self, path: &str, params: &[(&str, &str)]) -> Option<String> {
        let base = self.settings.frontend_url.trim_end_matches('/');
        match Url::parse(&format!("{base}{path}")) {
            Ok(mut url) => {
                url.query_pairs_mut().extend_pairs(params);
                Some(url.into())
            }
            Err(e) => {
                error!("Cannot build link from frontend URL {}: {}", base, e);
                None
            }
        }
    }
}
