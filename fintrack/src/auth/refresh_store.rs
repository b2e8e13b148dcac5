//! Revocable refresh-token sessions.
//!
//! Each live session is stored twice: a forward key `refresh:{jti}` holding the
//! user id, and a reverse set `user_refresh:{user_id}` listing the user's
//! session ids. Both directions change together in atomic batches, so
//! logging out one device is a single key delete and logging out everywhere
//! needs no scan.

use std::sync::Arc;

use super::{errors::AuthResult, models::UserId};
use crate::kv::{KeyValueStore, KvCommand};

/// Refresh-token session store
#[derive(Clone)]
pub struct RefreshTokenStore {
    kv: Arc<dyn KeyValueStore>,
}

impl RefreshTokenStore {
    /// Create a store on top of a key/value backend
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn refresh_key(jti: &str) -> String {
        format!("refresh:{jti}")
    }

    fn user_key(user_id: UserId) -> String {
        format!("user_refresh:{user_id}")
    }

    /// Record a session; the reverse set's TTL is refreshed to `ttl_secs`
    pub async fn save(&self, jti: &str, user_id: UserId, ttl_secs: u64) -> AuthResult<()> {
        let user_key = Self::user_key(user_id);
        self.kv
            .execute(vec![
                KvCommand::Set {
                    key: Self::refresh_key(jti),
                    value: user_id.to_string(),
                    ttl_secs,
                },
                KvCommand::SAdd {
                    key: user_key.clone(),
                    member: jti.to_string(),
                },
                KvCommand::Expire {
                    key: user_key,
                    ttl_secs,
                },
            ])
            .await?;
        Ok(())
    }

    /// Owner of a live session
    pub async fn get_user_id(&self, jti: &str) -> AuthResult<Option<UserId>> {
        let value = self.kv.get(&Self::refresh_key(jti)).await?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    /// Revoke one session; revoking an unknown session is a no-op
    pub async fn delete(&self, jti: &str, user_id: UserId) -> AuthResult<()> {
        self.kv
            .execute(vec![
                KvCommand::Del {
                    key: Self::refresh_key(jti),
                },
                KvCommand::SRem {
                    key: Self::user_key(user_id),
                    member: jti.to_string(),
                },
            ])
            .await?;
        Ok(())
    }

    /// Revoke every session of a user, returning how many were listed
    pub async fn delete_all_for_user(&self, user_id: UserId) -> AuthResult<usize> {
        let user_key = Self::user_key(user_id);
        let jtis = self.kv.smembers(&user_key).await?;
        if jtis.is_empty() {
            return Ok(0);
        }

        let count = jtis.len();
        let mut commands: Vec<KvCommand> = jtis
            .iter()
            .map(|jti| KvCommand::Del {
                key: Self::refresh_key(jti),
            })
            .collect();
        commands.push(KvCommand::Del { key: user_key });

        self.kv.execute(commands).await?;
        Ok(count)
    }

    /// Whether a session is still live
    pub async fn exists(&self, jti: &str) -> AuthResult<bool> {
        Ok(self.kv.exists(&Self::refresh_key(jti)).await?)
    }
}
