use crate::value::CachedValue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::BoxFuture;
use mercato::domain::{Banner, Brand, Category, LocationContext, Product, SpecialBanner};
use mercato::location::location_key;
use mercato::ports::{CacheStore, CatalogBackend};
use shared::{Error, Result, TtlMs};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// TTL and retry policy for the query layer.
#[derive(Clone, Copy, Debug)]
pub struct QueryPolicy {
    /// Categories and brands move slowly.
    pub categories_ttl: TtlMs,
    /// Banners and the special banner are rotated by merchandising.
    pub banners_ttl: TtlMs,
    /// Listings churn with availability; the stock stream overlays the
    /// rest of the staleness.
    pub products_ttl: TtlMs,
    /// Total attempts per fetch, first try included.
    pub retry_attempts: u32,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            categories_ttl: TtlMs::from_secs(15 * 60),
            banners_ttl: TtlMs::from_secs(10 * 60),
            products_ttl: TtlMs::from_secs(5 * 60),
            retry_attempts: 2,
        }
    }
}

impl QueryPolicy {
    pub fn from_config(config: &shared::config::Config) -> Self {
        Self {
            categories_ttl: TtlMs::from_secs(config.categories_ttl_secs),
            banners_ttl: TtlMs::from_secs(config.banners_ttl_secs),
            products_ttl: TtlMs::from_secs(config.products_ttl_secs),
            retry_attempts: config.retry_attempts,
        }
    }
}

type FetchFuture = BoxFuture<'static, Result<CachedValue>>;

/// Fetch-or-serve-from-cache orchestration for the catalog resources.
///
/// An unexpired entry is served without touching the network. On a miss,
/// concurrent callers for the same key are coalesced onto one backend
/// fetch; the result is written to the cache before anyone sees it. A
/// failed fetch writes nothing, so the next caller retries the network.
pub struct CatalogQueries {
    store: Arc<dyn CacheStore<CachedValue>>,
    backend: Arc<dyn CatalogBackend>,
    policy: QueryPolicy,
    in_flight: DashMap<String, broadcast::Sender<Result<CachedValue>>>,
}

impl CatalogQueries {
    pub fn new(
        store: Arc<dyn CacheStore<CachedValue>>,
        backend: Arc<dyn CatalogBackend>,
        policy: QueryPolicy,
    ) -> Self {
        Self {
            store,
            backend,
            policy,
            in_flight: DashMap::new(),
        }
    }

    pub async fn categories(&self, ctx: &LocationContext) -> Result<Vec<Category>> {
        let backend = self.backend.clone();
        let owned = ctx.clone();
        self.fetch_or_cached(
            location_key("categories", ctx),
            self.policy.categories_ttl,
            move || {
                let backend = backend.clone();
                let ctx = owned.clone();
                async move {
                    backend
                        .fetch_categories(&ctx)
                        .await
                        .map(CachedValue::Categories)
                }
                .boxed()
            },
        )
        .await?
        .into_categories()
    }

    pub async fn brands(&self, ctx: &LocationContext) -> Result<Vec<Brand>> {
        let backend = self.backend.clone();
        let owned = ctx.clone();
        self.fetch_or_cached(
            location_key("brands", ctx),
            self.policy.categories_ttl,
            move || {
                let backend = backend.clone();
                let ctx = owned.clone();
                async move { backend.fetch_brands(&ctx).await.map(CachedValue::Brands) }.boxed()
            },
        )
        .await?
        .into_brands()
    }

    pub async fn banners(&self, ctx: &LocationContext) -> Result<Vec<Banner>> {
        let backend = self.backend.clone();
        let owned = ctx.clone();
        self.fetch_or_cached(
            location_key("banners", ctx),
            self.policy.banners_ttl,
            move || {
                let backend = backend.clone();
                let ctx = owned.clone();
                async move { backend.fetch_banners(&ctx).await.map(CachedValue::Banners) }.boxed()
            },
        )
        .await?
        .into_banners()
    }

    pub async fn special_banner(&self, ctx: &LocationContext) -> Result<SpecialBanner> {
        let backend = self.backend.clone();
        let owned = ctx.clone();
        self.fetch_or_cached(
            location_key("special-banner", ctx),
            self.policy.banners_ttl,
            move || {
                let backend = backend.clone();
                let ctx = owned.clone();
                async move {
                    backend
                        .fetch_special_banner(&ctx)
                        .await
                        .map(CachedValue::Special)
                }
                .boxed()
            },
        )
        .await?
        .into_special()
    }

    /// The location-scoped product listing. Stock figures inside the
    /// result are point-in-time; overlay `StockStream` data when present.
    pub async fn products(&self, ctx: &LocationContext) -> Result<Vec<Product>> {
        let backend = self.backend.clone();
        let owned = ctx.clone();
        self.fetch_or_cached(
            location_key("products", ctx),
            self.policy.products_ttl,
            move || {
                let backend = backend.clone();
                let ctx = owned.clone();
                async move {
                    backend
                        .fetch_products(&ctx)
                        .await
                        .map(CachedValue::Products)
                }
                .boxed()
            },
        )
        .await?
        .into_products()
    }

    async fn fetch_or_cached(
        &self,
        key: String,
        ttl: TtlMs,
        fetch: impl Fn() -> FetchFuture + Send + Sync,
    ) -> Result<CachedValue> {
        if let Some(hit) = self.store.get(&key).await {
            debug!("cache hit for '{}'", key);
            return Ok(hit);
        }

        // One fetch per key at a time: the first miss becomes the leader,
        // later misses subscribe to its result.
        let tx = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let mut rx = entry.get().subscribe();
                drop(entry);
                debug!("joining in-flight fetch for '{}'", key);
                return match rx.recv().await {
                    Ok(result) => result,
                    // Leader aborted without settling; caller may retry.
                    Err(_) => Err(Error::Closed),
                };
            }
            Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                tx
            }
        };

        let result = self.fetch_with_retry(&fetch).await;
        if let Ok(value) = &result {
            self.store.set(key.clone(), value.clone(), ttl).await;
        }
        self.in_flight.remove(&key);
        let _ = tx.send(result.clone());
        result
    }

    async fn fetch_with_retry(
        &self,
        fetch: &(impl Fn() -> FetchFuture + Send + Sync),
    ) -> Result<CachedValue> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match fetch().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.retry_attempts => {
                    debug!("fetch attempt {} failed, retrying: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for CatalogQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogQueries")
            .field("policy", &self.policy)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use storage_engine::TtlMap;
    use tokio::time::sleep;

    /// Backend double with an instrumented call counter, an artificial
    /// response delay, and a queue of scripted failures.
    struct FakeBackend {
        calls: AtomicUsize,
        delay: Duration,
        failures: Mutex<VecDeque<Error>>,
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                failures: Mutex::new(VecDeque::new()),
            })
        }

        fn fail_next(&self, errors: impl IntoIterator<Item = Error>) {
            self.failures.lock().extend(errors);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn step(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            match self.failures.lock().pop_front() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CatalogBackend for FakeBackend {
        async fn fetch_categories(&self, _ctx: &LocationContext) -> Result<Vec<Category>> {
            self.step().await?;
            Ok(vec![Category {
                id: "c1".into(),
                name: "Dairy".into(),
                slug: "dairy".into(),
                image_url: None,
                parent_id: None,
            }])
        }

        async fn fetch_brands(&self, _ctx: &LocationContext) -> Result<Vec<Brand>> {
            self.step().await?;
            Ok(vec![Brand {
                id: "b1".into(),
                name: "Amulya".into(),
                slug: "amulya".into(),
                logo_url: None,
            }])
        }

        async fn fetch_banners(&self, _ctx: &LocationContext) -> Result<Vec<Banner>> {
            self.step().await?;
            Ok(Vec::new())
        }

        async fn fetch_special_banner(&self, _ctx: &LocationContext) -> Result<SpecialBanner> {
            self.step().await?;
            Ok(SpecialBanner {
                id: "s1".into(),
                image_url: "https://cdn.example/special.webp".into(),
                target_url: None,
                active: true,
            })
        }

        async fn fetch_products(&self, _ctx: &LocationContext) -> Result<Vec<Product>> {
            self.step().await?;
            Ok(vec![Product {
                id: "p1".into(),
                name: "Toned Milk 500ml".into(),
                slug: "toned-milk-500ml".into(),
                price: 28.0,
                mrp: Some(30.0),
                image_url: None,
                category_id: Some("c1".into()),
                stock: 12,
                variant_stocks: Default::default(),
            }])
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }
    }

    fn queries(backend: Arc<FakeBackend>, policy: QueryPolicy) -> CatalogQueries {
        let store: Arc<TtlMap<CachedValue>> = Arc::new(TtlMap::new());
        CatalogQueries::new(store, backend, policy)
    }

    #[tokio::test]
    async fn unexpired_entry_skips_the_network() {
        let backend = FakeBackend::new();
        let q = queries(backend.clone(), QueryPolicy::default());
        let ctx = LocationContext::local("302001");

        let first = q.categories(&ctx).await.unwrap();
        let second = q.categories(&ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let backend = FakeBackend::with_delay(Duration::from_millis(50));
        let q = queries(backend.clone(), QueryPolicy::default());
        let ctx = LocationContext::local("302001");

        let (a, b) = tokio::join!(q.categories(&ctx), q.categories(&ctx));

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn distinct_contexts_do_not_share_entries() {
        let backend = FakeBackend::new();
        let q = queries(backend.clone(), QueryPolicy::default());

        q.categories(&LocationContext::local("302001")).await.unwrap();
        q.categories(&LocationContext::local("110001")).await.unwrap();

        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_does_not_poison_the_cache() {
        let backend = FakeBackend::new();
        backend.fail_next([
            Error::Transport("reset".into()),
            Error::Transport("reset".into()),
        ]);
        let q = queries(backend.clone(), QueryPolicy::default());
        let ctx = LocationContext::local("302001");

        let failed = q.categories(&ctx).await;
        assert!(failed.is_err());
        // Both attempts burned, nothing cached.
        assert_eq!(backend.calls(), 2);

        // The next call goes back to the network and succeeds.
        assert!(q.categories(&ctx).await.is_ok());
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let backend = FakeBackend::new();
        backend.fail_next([Error::Timeout]);
        let q = queries(backend.clone(), QueryPolicy::default());

        let result = q.brands(&LocationContext::local("302001")).await;

        assert!(result.is_ok());
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn client_input_failure_is_not_retried() {
        let backend = FakeBackend::new();
        backend.fail_next([Error::BadRequest("bad pincode".into())]);
        let q = queries(backend.clone(), QueryPolicy::default());

        let result = q.banners(&LocationContext::local("not-a-pincode")).await;

        assert_eq!(result, Err(Error::BadRequest("bad pincode".into())));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_exactly_one_refetch() {
        let backend = FakeBackend::new();
        let policy = QueryPolicy {
            categories_ttl: TtlMs(100),
            ..QueryPolicy::default()
        };
        let q = queries(backend.clone(), policy);
        let ctx = LocationContext::local("302001");

        q.categories(&ctx).await.unwrap();
        q.categories(&ctx).await.unwrap();
        assert_eq!(backend.calls(), 1);

        sleep(Duration::from_millis(150)).await;
        q.categories(&ctx).await.unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn each_resource_has_its_own_entry() {
        let backend = FakeBackend::new();
        let q = queries(backend.clone(), QueryPolicy::default());
        let ctx = LocationContext::global(None);

        q.categories(&ctx).await.unwrap();
        q.brands(&ctx).await.unwrap();
        q.banners(&ctx).await.unwrap();
        q.special_banner(&ctx).await.unwrap();
        q.products(&ctx).await.unwrap();

        assert_eq!(backend.calls(), 5);

        // All five now served from cache.
        q.categories(&ctx).await.unwrap();
        q.special_banner(&ctx).await.unwrap();
        q.products(&ctx).await.unwrap();
        assert_eq!(backend.calls(), 5);
    }
}
