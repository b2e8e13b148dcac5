//! Authentication data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// User ID type
pub type UserId = i64;

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub is_active: bool,
    pub email_confirmed: bool,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,
    pub confirmation_token_created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    pub password_reset_token_created_at: Option<DateTime<Utc>>,
    pub last_password_reset: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a user record
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub email_confirmed: bool,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub confirmation_token: Option<String>,
    pub confirmation_token_created_at: Option<DateTime<Utc>>,
}

/// Partial update of a user record.
///
/// `None` leaves a column untouched. For nullable columns the inner option
/// distinguishes "set to a value" from "clear".
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub email_confirmed: Option<bool>,
    pub email_confirmed_at: Option<Option<DateTime<Utc>>>,
    pub confirmation_token: Option<Option<String>>,
    pub confirmation_token_created_at: Option<Option<DateTime<Utc>>>,
    pub password_reset_token: Option<Option<String>>,
    pub password_reset_token_created_at: Option<Option<DateTime<Utc>>>,
    pub last_password_reset: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserUpdate {
    /// True when the update would not touch any column
    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none()
            && self.is_active.is_none()
            && self.email_confirmed.is_none()
            && self.email_confirmed_at.is_none()
            && self.confirmation_token.is_none()
            && self.confirmation_token_created_at.is_none()
            && self.password_reset_token.is_none()
            && self.password_reset_token_created_at.is_none()
            && self.last_password_reset.is_none()
            && self.last_login_at.is_none()
    }

    /// Apply the update to an in-memory user record
    pub fn apply(&self, user: &mut User) {
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
        if let Some(confirmed) = self.email_confirmed {
            user.email_confirmed = confirmed;
        }
        if let Some(at) = self.email_confirmed_at {
            user.email_confirmed_at = at;
        }
        if let Some(token) = &self.confirmation_token {
            user.confirmation_token = token.clone();
        }
        if let Some(at) = self.confirmation_token_created_at {
            user.confirmation_token_created_at = at;
        }
        if let Some(token) = &self.password_reset_token {
            user.password_reset_token = token.clone();
        }
        if let Some(at) = self.password_reset_token_created_at {
            user.password_reset_token_created_at = at;
        }
        if let Some(at) = self.last_password_reset {
            // never moves backwards
            if user.last_password_reset.is_none_or(|current| at > current) {
                user.last_password_reset = Some(at);
            }
        }
        if let Some(at) = self.last_login_at {
            user.last_login_at = Some(at);
        }
    }
}

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: NaiveDate,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
}

/// JWT claims shared by access, refresh and password-reset tokens.
///
/// Reset tokens carry no `user_id`; only access tokens carry `pwd_reset_at`.
/// Tokens without a `typ` claim do not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub typ: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd_reset_at: Option<i64>,
}

/// Freshly issued refresh token together with its revocation key
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub jti: String,
    pub ttl_secs: u64,
}

/// Public profile of the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birthday: Option<NaiveDate>,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            birthday: user.birthday,
            email_confirmed: user.email_confirmed,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user() -> User {
        User {
            id: 1,
            email: "ann@example.com".to_string(),
            password_hash: "hash".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            birthday: None,
            is_active: true,
            email_confirmed: false,
            email_confirmed_at: None,
            confirmation_token: Some("token".to_string()),
            confirmation_token_created_at: Some(Utc::now()),
            password_reset_token: None,
            password_reset_token_created_at: None,
            last_password_reset: None,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_clears_nullable_columns() {
        let mut user = sample_user();
        let update = UserUpdate {
            email_confirmed: Some(true),
            email_confirmed_at: Some(Some(Utc::now())),
            confirmation_token: Some(None),
            confirmation_token_created_at: Some(None),
            ..Default::default()
        };
        update.apply(&mut user);

        assert!(user.email_confirmed);
        assert!(user.email_confirmed_at.is_some());
        assert!(user.confirmation_token.is_none());
        assert!(user.confirmation_token_created_at.is_none());
    }

    #[test]
    fn test_last_password_reset_never_moves_backwards() {
        let mut user = sample_user();
        let now = Utc::now();
        user.last_password_reset = Some(now);

        UserUpdate {
            last_password_reset: Some(now - Duration::hours(1)),
            ..Default::default()
        }
        .apply(&mut user);

        assert_eq!(user.last_password_reset, Some(now));
    }

    #[test]
    fn test_serialized_user_omits_secrets() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("\"confirmation_token\""));
        assert!(!json.contains("\"password_reset_token\""));
    }

    #[test]
    fn test_claims_skip_absent_optionals() {
        let claims = TokenClaims {
            typ: TokenKind::Reset,
            sub: Some("ann@example.com".to_string()),
            iat: 10,
            exp: 20,
            jti: Some("id".to_string()),
            user_id: None,
            pwd_reset_at: None,
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(!json.contains("user_id"));
        assert!(!json.contains("pwd_reset_at"));
        assert!(json.contains("\"typ\":\"reset\""));
    }

    #[test]
    fn test_claims_without_kind_are_rejected() {
        let json = r#"{"sub":"ann@example.com","iat":10,"exp":20,"user_id":1}"#;
        assert!(serde_json::from_str::<TokenClaims>(json).is_err());
    }
}
