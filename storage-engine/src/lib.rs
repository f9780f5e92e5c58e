pub mod moka_store;
pub mod ttl_map;

pub use moka_store::MokaStore;
pub use ttl_map::TtlMap;

use mercato::domain::CacheConfig;
use mercato::ports::{CacheStore, StorageFactory};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

/// Factory selecting a cache backend from configuration: the unbounded
/// per-entry-TTL map for session-scoped use, or the bounded Moka cache for
/// long-running deployments where unbounded growth is not acceptable.
pub struct StorageBackendFactory;

impl<V> StorageFactory<V> for StorageBackendFactory
where
    V: Debug + Send + Sync + Clone + 'static,
{
    fn create(&self, config: &CacheConfig) -> Arc<dyn CacheStore<V>> {
        match config.max_entries {
            Some(max_entries) => {
                info!(
                    "cache '{}' using bounded backend, capacity {}",
                    config.name, max_entries
                );
                Arc::new(MokaStore::new(
                    config.name.clone(),
                    Some(max_entries),
                    config.default_ttl,
                ))
            }
            None => {
                let map = Arc::new(TtlMap::new());
                if let Some(interval) = config.sweep_interval {
                    map.clone().spawn_sweeper(interval);
                }
                map
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::TtlMs;

    #[tokio::test]
    async fn factory_builds_per_entry_ttl_store_by_default() {
        let factory = StorageBackendFactory;
        let config = CacheConfig::new("catalog");
        let store: Arc<dyn CacheStore<String>> = factory.create(&config);

        store.set("k".into(), "v".into(), TtlMs(40)).await;
        assert_eq!(store.get("k").await, Some("v".to_string()));
        tokio::time::sleep(std::time::Duration::from_millis(70)).await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn factory_builds_bounded_store_when_capped() {
        let factory = StorageBackendFactory;
        let mut config = CacheConfig::new("catalog");
        config.max_entries = Some(64);
        let store: Arc<dyn CacheStore<String>> = factory.create(&config);

        store.set("k".into(), "v".into(), TtlMs(40)).await;
        // The bounded backend has no per-entry expiry and no global TTL
        // was configured, so the entry stays readable.
        tokio::time::sleep(std::time::Duration::from_millis(70)).await;
        assert_eq!(store.get("k").await, Some("v".to_string()));
    }
}
