//! Integration tests for email confirmation and confirmation resend.

mod common;

use chrono::{Duration, Utc};
use common::{Harness, PASSWORD, register_request};
use fintrack::{
    auth::{AuthError, AuthSettings, LoginRequest, UserUpdate},
    db::UserRepository,
};

fn login(email: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: PASSWORD.to_string(),
    }
}

#[tokio::test]
async fn test_registration_sends_confirmation_link() {
    let h = Harness::with_confirmation();

    let user = h.auth.register(register_request("ann@example.com")).await.unwrap();

    assert!(!user.email_confirmed);
    assert!(user.email_confirmed_at.is_none());
    let token = user.confirmation_token.clone().expect("confirmation token");
    assert!(user.confirmation_token_created_at.is_some());

    let emails = h.wait_for_emails(1).await;
    assert_eq!(emails[0].to, "ann@example.com");
    assert_eq!(emails[0].subject, "Confirm your registration");
    assert!(
        emails[0]
            .html
            .contains("https://app.fintrack.test/email/confirm?email=ann%40example.com&amp;token=")
    );
    assert!(emails[0].html.contains(&token));
}

#[tokio::test]
async fn test_login_requires_confirmed_email() {
    let h = Harness::with_confirmation();
    let user = h.auth.register(register_request("ann@example.com")).await.unwrap();

    let blocked = h.auth.login(login("ann@example.com")).await;
    assert!(matches!(blocked, Err(AuthError::EmailNotConfirmed)));

    let token = user.confirmation_token.unwrap();
    h.auth.confirm_email("ann@example.com", &token).await.unwrap();

    let stored = h.users.find_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.email_confirmed);
    assert!(stored.email_confirmed_at.is_some());
    assert!(stored.confirmation_token.is_none());
    assert!(stored.confirmation_token_created_at.is_none());

    assert!(h.auth.login(login("ann@example.com")).await.is_ok());
}

#[tokio::test]
async fn test_wrong_password_beats_unconfirmed_email() {
    let h = Harness::with_confirmation();
    h.auth.register(register_request("ann@example.com")).await.unwrap();

    let result = h
        .auth
        .login(LoginRequest {
            email: "ann@example.com".to_string(),
            password: "Wr0ng#Password".to_string(),
        })
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_confirmation_token_is_single_use() {
    let h = Harness::with_confirmation();
    let user = h.auth.register(register_request("ann@example.com")).await.unwrap();
    let token = user.confirmation_token.unwrap();

    h.auth.confirm_email("ann@example.com", &token).await.unwrap();

    let again = h.auth.confirm_email("ann@example.com", &token).await;
    assert!(matches!(again, Err(AuthError::InvalidOrExpiredEmailToken)));
}

#[tokio::test]
async fn test_confirmation_requires_matching_email() {
    let h = Harness::with_confirmation();
    let ann = h.auth.register(register_request("ann@example.com")).await.unwrap();
    h.auth.register(register_request("bob@example.com")).await.unwrap();

    let result = h
        .auth
        .confirm_email("bob@example.com", &ann.confirmation_token.unwrap())
        .await;
    assert!(matches!(result, Err(AuthError::InvalidOrExpiredEmailToken)));
}

#[tokio::test]
async fn test_expired_confirmation_token() {
    let h = Harness::with_confirmation();
    let user = h.auth.register(register_request("ann@example.com")).await.unwrap();
    h.users
        .update(
            user.id,
            UserUpdate {
                confirmation_token_created_at: Some(Some(Utc::now() - Duration::hours(25))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = h
        .auth
        .confirm_email("ann@example.com", &user.confirmation_token.unwrap())
        .await;
    assert!(matches!(result, Err(AuthError::InvalidOrExpiredEmailToken)));
}

#[tokio::test]
async fn test_resend_too_early() {
    let h = Harness::with_confirmation();
    let user = h.auth.register(register_request("ann@example.com")).await.unwrap();

    let result = h.auth.resend_confirmation(&user).await;
    assert!(matches!(result, Err(AuthError::TooEarlyResend)));
}

#[tokio::test]
async fn test_resend_after_window_issues_new_token() {
    let h = Harness::with_confirmation();
    let user = h.auth.register(register_request("ann@example.com")).await.unwrap();
    h.wait_for_emails(1).await;
    let old_token = user.confirmation_token.clone().unwrap();

    let aged = h
        .users
        .update(
            user.id,
            UserUpdate {
                confirmation_token_created_at: Some(Some(Utc::now() - Duration::hours(48))),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    h.auth.resend_confirmation(&aged).await.unwrap();

    let stored = h.users.find_by_id(user.id).await.unwrap().unwrap();
    let new_token = stored.confirmation_token.unwrap();
    assert_ne!(new_token, old_token);

    let emails = h.wait_for_emails(2).await;
    assert!(emails[1].html.contains(&new_token));

    let stale = h.auth.confirm_email("ann@example.com", &old_token).await;
    assert!(matches!(stale, Err(AuthError::InvalidOrExpiredEmailToken)));
    h.auth.confirm_email("ann@example.com", &new_token).await.unwrap();
}

#[tokio::test]
async fn test_resend_for_confirmed_user() {
    let h = Harness::without_confirmation();
    let user = h.auth.register(register_request("ann@example.com")).await.unwrap();

    let result = h.auth.resend_confirmation(&user).await;
    assert!(matches!(result, Err(AuthError::EmailAlreadyConfirmed)));
}

#[tokio::test]
async fn test_short_confirmation_window() {
    let h = Harness::new(AuthSettings {
        email_confirmation_enabled: true,
        confirm_token_expiry: Duration::seconds(1),
        ..AuthSettings::default()
    });
    let user = h.auth.register(register_request("ann@example.com")).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let result = h
        .auth
        .confirm_email("ann@example.com", user.confirmation_token.as_deref().unwrap())
        .await;
    assert!(matches!(result, Err(AuthError::InvalidOrExpiredEmailToken)));
    assert!(h.auth.resend_confirmation(&user).await.is_ok());
}

#[tokio::test]
async fn test_shutdown_flushes_pending_confirmation_email() {
    let h = Harness::with_confirmation();
    h.auth.register(register_request("ann@example.com")).await.unwrap();

    let outbox = h.outbox.clone();
    h.worker.shutdown().await;

    assert_eq!(outbox.messages().len(), 1);
}
