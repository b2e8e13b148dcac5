//! In-process key/value store with lazy expiry.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueStore, KvCommand, KvError, KvResult};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Key/value store kept in process memory.
///
/// A batch is staged against a copy of the keys it touches and committed
/// under a single write lock, so readers never observe half of a batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Whether the store holds no live keys
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining time to live of a key, if it exists and has an expiry
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let entry = entries.get(key).filter(|entry| entry.is_live(now))?;
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }

    async fn live_entry(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .cloned()
    }
}

fn apply(
    staged: &mut HashMap<String, Option<Entry>>,
    command: KvCommand,
    now: Instant,
) -> KvResult<()> {
    match command {
        KvCommand::Set {
            key,
            value,
            ttl_secs,
        } => {
            staged.insert(
                key,
                Some(Entry {
                    value: Value::Str(value),
                    expires_at: Some(now + Duration::from_secs(ttl_secs)),
                }),
            );
        }
        KvCommand::SAdd { key, member } => {
            let slot = staged.entry(key.clone()).or_insert(None);
            match slot {
                Some(Entry {
                    value: Value::Set(members),
                    ..
                }) => {
                    members.insert(member);
                }
                Some(_) => return Err(KvError::WrongType(key)),
                None => {
                    *slot = Some(Entry {
                        value: Value::Set(HashSet::from([member])),
                        expires_at: None,
                    });
                }
            }
        }
        KvCommand::SRem { key, member } => {
            if let Some(slot) = staged.get_mut(&key) {
                match slot {
                    Some(Entry {
                        value: Value::Set(members),
                        ..
                    }) => {
                        members.remove(&member);
                        if members.is_empty() {
                            *slot = None;
                        }
                    }
                    Some(_) => return Err(KvError::WrongType(key)),
                    None => {}
                }
            }
        }
        KvCommand::Expire { key, ttl_secs } => {
            if let Some(Some(entry)) = staged.get_mut(&key) {
                entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
            }
        }
        KvCommand::Del { key } => {
            staged.insert(key, None);
        }
    }
    Ok(())
}

fn command_key(command: &KvCommand) -> &str {
    match command {
        KvCommand::Set { key, .. }
        | KvCommand::SAdd { key, .. }
        | KvCommand::SRem { key, .. }
        | KvCommand::Expire { key, .. }
        | KvCommand::Del { key } => key,
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        match self.live_entry(key).await {
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value)),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn exists(&self, key: &str) -> KvResult<bool> {
        Ok(self.live_entry(key).await.is_some())
    }

    async fn smembers(&self, key: &str) -> KvResult<Vec<String>> {
        match self.live_entry(key).await {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.into_iter().collect()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn execute(&self, commands: Vec<KvCommand>) -> KvResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let mut staged: HashMap<String, Option<Entry>> = HashMap::new();
        for command in &commands {
            let key = command_key(command);
            if !staged.contains_key(key) {
                let current = entries.get(key).filter(|entry| entry.is_live(now)).cloned();
                staged.insert(key.to_string(), current);
            }
        }

        for command in commands {
            apply(&mut staged, command, now)?;
        }

        for (key, entry) in staged {
            match entry {
                Some(entry) => {
                    entries.insert(key, entry);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }

        entries.retain(|_, entry| entry.is_live(now));
        Ok(())
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(key: &str, value: &str, ttl_secs: u64) -> KvCommand {
        KvCommand::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl_secs,
        }
    }

    fn sadd(key: &str, member: &str) -> KvCommand {
        KvCommand::SAdd {
            key: key.to_string(),
            member: member.to_string(),
        }
    }

    #[tokio::test]
    async fn test_set_get_and_delete() {
        let store = MemoryStore::new();
        store.execute(vec![set("a", "1", 60)]).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert!(store.exists("a").await.unwrap());

        store
            .execute(vec![KvCommand::Del {
                key: "a".to_string(),
            }])
            .await
            .unwrap();
        assert!(!store.exists("a").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_membership() {
        let store = MemoryStore::new();
        store
            .execute(vec![sadd("s", "x"), sadd("s", "y"), sadd("s", "x")])
            .await
            .unwrap();

        let mut members = store.smembers("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["x", "y"]);

        store
            .execute(vec![
                KvCommand::SRem {
                    key: "s".to_string(),
                    member: "x".to_string(),
                },
                KvCommand::SRem {
                    key: "s".to_string(),
                    member: "y".to_string(),
                },
            ])
            .await
            .unwrap();
        assert!(!store.exists("s").await.unwrap(), "empty sets are removed");
    }

    #[tokio::test]
    async fn test_failed_batch_applies_nothing() {
        let store = MemoryStore::new();
        store.execute(vec![set("str", "v", 60)]).await.unwrap();

        let result = store
            .execute(vec![set("other", "v", 60), sadd("str", "member")])
            .await;

        assert!(matches!(result, Err(KvError::WrongType(_))));
        assert!(!store.exists("other").await.unwrap());
        assert_eq!(store.get("str").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_expire_sets_ttl() {
        let store = MemoryStore::new();
        store
            .execute(vec![
                sadd("s", "x"),
                KvCommand::Expire {
                    key: "s".to_string(),
                    ttl_secs: 30,
                },
            ])
            .await
            .unwrap();

        let ttl = store.ttl("s").await.unwrap();
        assert!(ttl <= Duration::from_secs(30));
        assert!(ttl > Duration::from_secs(25));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store.execute(vec![set("short", "v", 1)]).await.unwrap();
        assert!(store.exists("short").await.unwrap());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!store.exists("short").await.unwrap());
        assert_eq!(store.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_type_reads() {
        let store = MemoryStore::new();
        store.execute(vec![sadd("s", "x")]).await.unwrap();
        assert!(matches!(store.get("s").await, Err(KvError::WrongType(_))));
    }
}
