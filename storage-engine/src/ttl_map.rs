use async_trait::async_trait;
use dashmap::DashMap;
use mercato::ports::CacheStore;
use shared::TtlMs;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// One cached value with its expiry clock. Owned exclusively by the map;
/// readers get clones of the data, never the entry.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    data: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn new(data: V, ttl: TtlMs) -> Self {
        Self {
            data,
            created_at: Instant::now(),
            ttl: ttl.as_duration(),
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// In-memory cache with per-entry TTL and lazy eviction.
///
/// An expired entry is deleted as a side effect of the read that finds it,
/// so no background sweep is required for correctness. `spawn_sweeper` can
/// run one anyway to bound memory between reads.
pub struct TtlMap<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V> TtlMap<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    /// Periodically sweep expired entries. The task ends on its own once
    /// the map is dropped.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let map = Arc::downgrade(&self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                let Some(map) = map.upgrade() else { break };
                let removed = map.sweep();
                if removed > 0 {
                    debug!("swept {} expired cache entries", removed);
                }
            }
        })
    }

    /// Remove the key if its entry is (still) expired. Re-checks under the
    /// shard lock so a concurrent fresh `set` is never thrown away.
    fn evict_if_expired(&self, key: &str) {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
    }
}

impl<V> Default for TtlMap<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> CacheStore<V> for TtlMap<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    async fn set(&self, key: String, value: V, ttl: TtlMs) {
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    async fn get(&self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.data.clone()),
            Some(_) => {}
            None => return None,
        }
        self.evict_if_expired(key);
        None
    }

    async fn has(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return true,
            Some(_) => {}
            None => return false,
        }
        self.evict_if_expired(key);
        false
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    async fn clear(&self) {
        self.entries.clear();
    }

    async fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl<V> Debug for TtlMap<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlMap")
            .field("entry_count", &self.entries.len())
            .finish()
    }
}
