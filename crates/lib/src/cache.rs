//! Time-windowed snapshot cache keyed by resource name.
//!
//! Entries expire purely by age; callers may also invalidate a key or clear everything.
//! Concurrent fills of the same key are serialized so only the first caller hits the backend.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// Freshness window used when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry<V> {
    value: Arc<V>,
    captured_at: Instant,
}

/// Age (whole seconds) and freshness of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub age_secs: u64,
    pub valid: bool,
}

pub struct TtlCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    fill_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            fill_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`. An expired entry is dropped and `None` returned.
    pub async fn get(&self, key: &str) -> Option<Arc<V>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(e) if e.captured_at.elapsed() < self.ttl => return Some(e.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write().await;
        if let Some(e) = entries.get(key) {
            if e.captured_at.elapsed() < self.ttl {
                return Some(e.value.clone());
            }
            log::debug!("cache entry {} expired", key);
            entries.remove(key);
        }
        None
    }

    /// Store a snapshot under `key`, stamped now.
    pub async fn insert(&self, key: impl Into<String>, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.write().await.insert(
            key.into(),
            CacheEntry {
                value: value.clone(),
                captured_at: Instant::now(),
            },
        );
        value
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Age and validity of every stored entry, expired ones included.
    pub async fn status(&self) -> BTreeMap<String, CacheStatus> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .map(|(k, e)| {
                let age = e.captured_at.elapsed();
                (
                    k.clone(),
                    CacheStatus {
                        age_secs: age.as_secs_f64().round() as u64,
                        valid: age < self.ttl,
                    },
                )
            })
            .collect()
    }

    async fn fill_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.fill_locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Fresh value for `key`, or run `fill` to produce one. `fill` results for which `keep` is
    /// false are returned but not stored. Callers arriving while a fill for the same key is in
    /// progress wait for it and then re-check the cache.
    pub async fn get_or_fill<F, Fut>(&self, key: &str, fill: F, keep: impl Fn(&V) -> bool) -> Arc<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(v) = self.get(key).await {
            log::debug!("cache hit: {}", key);
            return v;
        }
        let lock = self.fill_lock(key).await;
        let _guard = lock.lock().await;
        if let Some(v) = self.get(key).await {
            log::debug!("cache hit after waiting for fill: {}", key);
            return v;
        }
        let value = fill().await;
        if keep(&value) {
            self.insert(key, value).await
        } else {
            Arc::new(value)
        }
    }
}
