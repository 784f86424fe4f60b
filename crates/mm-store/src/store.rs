//! Shared state store boundary and its in-memory implementation.
//!
//! Every operation is individually atomic. Nothing here offers multi-key
//! transactions; callers express multi-step mutations as idempotent
//! sequences of single-key calls.

use std::collections::HashMap;
use std::time::Duration;

use mm_schemas::{MatchError, MatchResult};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Key-value store with per-key expiry, reachable by every service instance.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> MatchResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> MatchResult<()>;

    /// Set `key`, expiring it after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> MatchResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> MatchResult<()>;
}

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local store. Expiry is evaluated lazily against the tokio clock,
/// so paused-time tests can step past a TTL deterministically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted keys that have not expired.
    pub async fn live_keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> MatchResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(e) if e.is_live(now) => return Ok(Some(e.value.clone())),
                Some(_) => {}
            }
        }
        // Expired: drop it, unless a writer replaced it in between.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String) -> MatchResult<()> {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> MatchResult<()> {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> MatchResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

pub(crate) async fn get_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> MatchResult<Option<T>> {
    match store.get(key).await? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| MatchError::Storage(format!("decode {key}: {e}"))),
    }
}

pub(crate) fn to_json<T: Serialize>(key: &str, value: &T) -> MatchResult<String> {
    serde_json::to_string(value).map_err(|e| MatchError::Storage(format!("encode {key}: {e}")))
}
