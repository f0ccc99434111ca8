use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use alexandria_types::AlexandriaError;

/// Boundary to the shared TTL'd key-value store used for quota counters,
/// rate-limit windows, and backfill checkpoints.
///
/// Counters are advisory: a small read-modify-write race on hot keys is
/// acceptable because database unique constraints remain authoritative.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, AlexandriaError>;

    /// Store a value, optionally expiring after `ttl`.
    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), AlexandriaError>;

    /// Remove a value; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AlexandriaError>;

    /// Atomically add `delta` to an integer counter and return the new
    /// value. Absent or expired keys start from zero; `ttl` applies only
    /// when the key is created.
    async fn incr(
        &self,
        key: &str,
        delta: u64,
        ttl: Option<Duration>,
    ) -> Result<u64, AlexandriaError>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory [`KvStore`] for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, AlexandriaError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().map_err(poisoned)?;
        match entries.get(key) {
            Some(entry) if entry.live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), AlexandriaError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AlexandriaError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    async fn incr(
        &self,
        key: &str,
        delta: u64,
        ttl: Option<Duration>,
    ) -> Result<u64, AlexandriaError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let current = match entries.get(key) {
            Some(entry) if entry.live(now) => entry.value.parse::<u64>().unwrap_or(0),
            _ => 0,
        };
        let next = current.saturating_add(delta);
        let expires_at = match entries.get(key) {
            Some(entry) if entry.live(now) => entry.expires_at,
            _ => ttl.map(|d| now + d),
        };
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> AlexandriaError {
    AlexandriaError::Internal("kv mutex poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let kv = MemoryKv::new();
        kv.put("k", "v".into(), None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
        kv.delete("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let kv = MemoryKv::new();
        kv.put("k", "v".into(), Some(Duration::ZERO)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_starts_from_zero_and_accumulates() {
        let kv = MemoryKv::new();
        assert_eq!(kv.incr("n", 1, None).await.unwrap(), 1);
        assert_eq!(kv.incr("n", 2, None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn incr_restarts_after_expiry() {
        let kv = MemoryKv::new();
        kv.incr("n", 5, Some(Duration::ZERO)).await.unwrap();
        assert_eq!(kv.incr("n", 1, None).await.unwrap(), 1);
    }
}
