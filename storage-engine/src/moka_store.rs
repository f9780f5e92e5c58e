use async_trait::async_trait;
use mercato::ports::CacheStore;
use moka::future::Cache;
use shared::TtlMs;
use std::fmt::Debug;
use std::time::Duration;

/// Moka-backed cache with a capacity bound and TinyLFU eviction.
///
/// The hardening backend for long-running deployments: unlike `TtlMap` it
/// cannot grow without limit. Moka has no per-entry TTL, so expiry is the
/// global `default_ttl` configured at construction; the per-entry TTL on
/// `set` is accepted for interface compatibility and ignored.
pub struct MokaStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    cache: Cache<String, V>,
}

impl<V> MokaStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    pub fn new(name: String, max_entries: Option<u64>, default_ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().name(&name);

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        if let Some(ttl) = default_ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            cache: builder.build(),
        }
    }
}

#[async_trait]
impl<V> CacheStore<V> for MokaStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    async fn set(&self, key: String, value: V, _ttl: TtlMs) {
        self.cache.insert(key, value).await;
    }

    async fn get(&self, key: &str) -> Option<V> {
        self.cache.get(key).await
    }

    async fn has(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    async fn delete(&self, key: &str) -> bool {
        self.cache.remove(key).await.is_some()
    }

    async fn clear(&self) {
        self.cache.invalidate_all();
    }

    async fn entry_count(&self) -> usize {
        self.cache.entry_count() as usize
    }
}

impl<V> Debug for MokaStore<V>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}
