//! In-memory user store for tests and local development.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use super::repository::UserRepository;
use crate::auth::{AuthError, AuthResult, NewUser, User, UserId, UserUpdate};

/// User store kept in process memory
#[derive(Debug)]
pub struct MemoryUserRepository {
    users: RwLock<BTreeMap<UserId, User>>,
    next_id: AtomicI64,
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn tokens_match(stored: Option<&str>, presented: &str) -> bool {
    stored.is_some_and(|stored| bool::from(stored.as_bytes().ct_eq(presented.as_bytes())))
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> AuthResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(AuthError::UserAlreadyExists(user.email));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = User {
            id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            birthday: user.birthday,
            is_active: true,
            email_confirmed: user.email_confirmed,
            email_confirmed_at: user.email_confirmed_at,
            confirmation_token: user.confirmation_token,
            confirmation_token_created_at: user.confirmation_token_created_at,
            password_reset_token: None,
            password_reset_token_created_at: None,
            last_password_reset: None,
            last_login_at: None,
            created_at: Utc::now(),
        };
        users.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, user_id: UserId, update: UserUpdate) -> AuthResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&user_id).map(|user| {
            update.apply(user);
            user.clone()
        }))
    }

    async fn find_by_email_and_reset_token(
        &self,
        email: &str,
        token: &str,
    ) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| {
                user.email == email && tokens_match(user.password_reset_token.as_deref(), token)
            })
            .cloned())
    }

    async fn find_by_email_and_confirmation_token(
        &self,
        email: &str,
        token: &str,
    ) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| {
                user.email == email && tokens_match(user.confirmation_token.as_deref(), token)
            })
            .cloned())
    }
}
