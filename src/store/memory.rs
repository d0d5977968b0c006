//! In-process counter store for single-instance deployments and tests.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{CounterStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

fn deadline(now: Instant, ttl: Duration) -> StoreResult<Instant> {
    now.checked_add(ttl).ok_or(StoreError::InvalidExpiry(ttl))
}

/// A counter store held in process memory.
///
/// Keys expire against the tokio clock, so a paused test runtime can advance
/// through TTLs without sleeping. Each key's shard lock makes `incr` atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired key and return how many remain.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.entries.len()
    }

    /// Number of keys held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Purge expired keys every `interval` until the store is dropped.
    pub fn spawn_purge_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(live) = store.upgrade() else {
                    break;
                };
                let remaining = live.purge_expired();
                debug!(remaining = remaining, "Purged expired counter store keys");
            }
        })
    }

    /// Remaining time-to-live of a live key, `None` if absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if !entry.is_live(now) {
            return None;
        }
        entry.expires_at.map(|deadline| deadline - now)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let now = Instant::now();

        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if !entry.is_live(now) {
                    *entry = Entry {
                        value: "1".to_string(),
                        expires_at: None,
                    };
                    return Ok(1);
                }

                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| StoreError::NotAnInteger(key.to_string()))?;
                let next = current + 1;
                entry.value = next.to_string();
                trace!(key = %key, value = next, "Incremented counter");
                Ok(next)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: "1".to_string(),
                    expires_at: None,
                });
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();

        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = Some(deadline(now, ttl)?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = deadline(Instant::now(), ttl)?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        }

        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incr_starts_at_one() {
        let store = MemoryStore::new();

        assert_eq!(store.incr("ip:10.0.0.1").await.unwrap(), 1);
        assert_eq!(store.incr("ip:10.0.0.1").await.unwrap(), 2);
        assert_eq!(store.incr("ip:10.0.0.2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let store = MemoryStore::new();
        store
            .set_ex("flag", "blocked", Duration::from_secs(5))
            .await
            .unwrap();

        let err = store.incr("flag").await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnInteger(ref key) if key == "flag"));
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = MemoryStore::new();
        assert!(!store.expire("nope", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_expires_and_restarts() {
        let store = MemoryStore::new();

        store.incr("k").await.unwrap();
        store.incr("k").await.unwrap();
        assert!(store.expire("k", Duration::from_secs(1)).await.unwrap());
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.ttl("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_overwrites_and_expires() {
        let store = MemoryStore::new();

        store
            .set_ex("k:block", "blocked", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(store.get("k:block").await.unwrap().as_deref(), Some("blocked"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("k:block").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_out_of_range_expiry_is_an_error() {
        let store = MemoryStore::new();
        store.incr("k").await.unwrap();

        let err = store
            .set_ex("k:block", "blocked", Duration::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidExpiry(_)));
        assert_eq!(store.get("k:block").await.unwrap(), None);

        let err = store.expire("k", Duration::MAX).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidExpiry(_)));
        assert_eq!(store.ttl("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_drops_expired_key() {
        let store = MemoryStore::new();
        store.set_ex("k:block", "blocked", Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.len(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k:block").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task_drops_idle_keys() {
        let store = Arc::new(MemoryStore::new());
        let purge = store.spawn_purge_task(Duration::from_secs(1));

        for i in 0..1000 {
            let key = format!("ip:10.0.{}.{}", i / 256, i % 256);
            store.incr(&key).await.unwrap();
            store.expire(&key, Duration::from_secs(1)).await.unwrap();
        }
        store.set_ex("token:t:block", "blocked", Duration::from_secs(5)).await.unwrap();
        store.incr("persistent").await.unwrap();
        assert_eq!(store.len(), 1002);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(store.len(), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.len(), 1);

        drop(store);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(purge.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set_ex("short", "x", Duration::from_secs(1)).await.unwrap();
        store.set_ex("long", "x", Duration::from_secs(10)).await.unwrap();
        store.incr("persistent").await.unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.purge_expired(), 2);
    }
}
