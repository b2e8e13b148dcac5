//! Shared setup for auth integration tests: in-memory stores, RSA test keys
//! and an outbox that records delivered email.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use fintrack::{
    auth::{
        Algorithm, AuthManager, AuthSettings, PasswordHandler, PasswordPolicyLevel,
        PasswordValidator, RefreshTokenStore, RegisterRequest, TokenIssuer, TokenLifetimes,
    },
    db::MemoryUserRepository,
    email::{
        EmailMessage, EmailQueue, EmailResult, EmailSender, EmailWorker, Mailer, RetryPolicy,
        TemplateRenderer,
    },
    kv::MemoryStore,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub const RSA_PRIVATE: &[u8] = include_bytes!("../fixtures/rsa_private.pem");
pub const RSA_PUBLIC: &[u8] = include_bytes!("../fixtures/rsa_public.pem");

pub const PASSWORD: &str = "Str0ng#Passw0rd";
pub const NEW_PASSWORD: &str = "An0ther#Secret9";

/// Sender that keeps every message in memory
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<EmailMessage>>,
}

impl Outbox {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for Outbox {
    async fn send(&self, to: &str, subject: &str, html: &str) -> EmailResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push(EmailMessage::new(to, subject, html));
        Ok(())
    }
}

pub struct Harness {
    pub auth: AuthManager,
    pub users: Arc<MemoryUserRepository>,
    pub kv: Arc<MemoryStore>,
    pub tokens: Arc<TokenIssuer>,
    pub outbox: Arc<Outbox>,
    pub worker: EmailWorker,
}

impl Harness {
    pub fn new(settings: AuthSettings) -> Self {
        let users = Arc::new(MemoryUserRepository::new());
        let kv = Arc::new(MemoryStore::new());
        let tokens = Arc::new(
            TokenIssuer::from_pem(
                Algorithm::RS256,
                RSA_PRIVATE,
                RSA_PUBLIC,
                TokenLifetimes::default(),
            )
            .unwrap(),
        );
        let outbox = Arc::new(Outbox::default());
        let (queue, worker) = EmailQueue::start(
            outbox.clone(),
            RetryPolicy {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
            },
            32,
        );

        let auth = AuthManager::new(
            users.clone(),
            RefreshTokenStore::new(kv.clone()),
            tokens.clone(),
            PasswordHandler::new(1, 1024).unwrap(),
            Arc::new(PasswordValidator::new(PasswordPolicyLevel::Medium)),
            Mailer::new(TemplateRenderer::builtin(), queue),
            settings,
        );

        Self {
            auth,
            users,
            kv,
            tokens,
            outbox,
            worker,
        }
    }

    pub fn without_confirmation() -> Self {
        Self::new(AuthSettings::default())
    }

    pub fn with_confirmation() -> Self {
        Self::new(AuthSettings {
            email_confirmation_enabled: true,
            frontend_url: "https://app.fintrack.test".to_string(),
            ..AuthSettings::default()
        })
    }

    /// Wait until the worker has delivered at least `count` messages
    pub async fn wait_for_emails(&self, count: usize) -> Vec<EmailMessage> {
        for _ in 0..200 {
            let messages = self.outbox.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {count} emails, got {}",
            self.outbox.messages().len()
        );
    }
}

pub fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        first_name: "Ann".to_string(),
        last_name: "Lee".to_string(),
        birthday: NaiveDate::from_ymd_opt(1990, 4, 1).unwrap(),
    }
}
