//! Key/value store abstraction used for session state.
//!
//! The auth core only needs string keys with TTLs, string sets and atomic
//! batches. [`RedisStore`] backs production; [`MemoryStore`] serves tests and
//! single-process development setups.

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use async_trait::async_trait;
use thiserror::Error;

/// Key/value store errors
#[derive(Debug, Error)]
pub enum KvError {
    /// Redis client or server error
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Key holds a value of another type
    #[error("Wrong type for key {0}")]
    WrongType(String),
}

/// Result type for key/value operations
pub type KvResult<T> = Result<T, KvError>;

/// One mutation inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvCommand {
    /// Set a string value with an expiry
    Set {
        key: String,
        value: String,
        ttl_secs: u64,
    },
    /// Add a member to a set
    SAdd { key: String, member: String },
    /// Remove a member from a set
    SRem { key: String, member: String },
    /// Reset the expiry of an existing key
    Expire { key: String, ttl_secs: u64 },
    /// Delete a key of any type
    Del { key: String },
}

/// Fast key/value store with atomic batches
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a string value
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Whether a key exists and has not expired
    async fn exists(&self, key: &str) -> KvResult<bool>;

    /// Members of a set (empty when the key is absent)
    async fn smembers(&self, key: &str) -> KvResult<Vec<String>>;

    /// Apply every command or none of them
    async fn execute(&self, commands: Vec<KvCommand>) -> KvResult<()>;

    /// Connectivity check
    async fn ping(&self) -> KvResult<()>;
}
