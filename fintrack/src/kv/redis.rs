//! Redis-backed key/value store.

use ::redis::{AsyncCommands, Client, aio::ConnectionManager, pipe};
use async_trait::async_trait;

use super::{KeyValueStore, KvCommand, KvResult};

/// Key/value store on a multiplexed, auto-reconnecting Redis connection.
///
/// Batches run as `MULTI`/`EXEC` pipelines.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis
    ///
    /// # Arguments
    ///
    /// * `url` - Redis URL, e.g. `redis://localhost:6379/0`
    pub async fn connect(url: &str) -> KvResult<Self> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.connection.clone();
        Ok(conn.get(key).await?)
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.connection.clone();
        Ok(conn.exists(key).await?)
    }

    async fn smembers(&self, key: &str) -> KvResult<Vec<String>> {
        let mut conn = self.connection.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn execute(&self, commands: Vec<KvCommand>) -> KvResult<()> {
        if commands.is_empty() {
            return Ok(());
        }

        let mut batch = pipe();
        batch.atomic();
        for command in &commands {
            match command {
                KvCommand::Set {
                    key,
                    value,
                    ttl_secs,
                } => batch.set_ex(key, value, *ttl_secs).ignore(),
                KvCommand::SAdd { key, member } => batch.sadd(key, member).ignore(),
                KvCommand::SRem { key, member } => batch.srem(key, member).ignore(),
                KvCommand::Expire { key, ttl_secs } => batch
                    .expire(key, i64::try_from(*ttl_secs).unwrap_or(i64::MAX))
                    .ignore(),
                KvCommand::Del { key } => batch.del(key).ignore(),
            };
        }

        let mut conn = self.connection.clone();
        let _: () = batch.query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.connection.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
