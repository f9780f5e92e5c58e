use crate::domain::{Banner, Brand, CacheConfig, Category, LocationContext, Product, SpecialBanner};
use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::{Result, TtlMs};
use std::fmt::Debug;
use std::sync::Arc;

// Ports are the pluggable extension points for storage backends and the
// backend API transports.

/// Port for cache storage with per-entry TTL semantics.
///
/// `get` and `has` apply the expiry check and evict an expired entry as a
/// side effect of the read, so callers never observe stale data.
#[async_trait]
pub trait CacheStore<V>: Send + Sync + 'static
where
    V: Debug + Send + Sync + Clone + 'static,
{
    /// Unconditional overwrite; resets the expiry clock.
    async fn set(&self, key: String, value: V, ttl: TtlMs);
    async fn get(&self, key: &str) -> Option<V>;
    async fn has(&self, key: &str) -> bool;
    /// Returns whether the key was present.
    async fn delete(&self, key: &str) -> bool;
    async fn clear(&self);
    /// Entries currently held, expired-but-unswept ones included.
    async fn entry_count(&self) -> usize;
}

/// Port for creating cache storage from configuration
pub trait StorageFactory<V>: Send + Sync + 'static
where
    V: Debug + Send + Sync + Clone + 'static,
{
    fn create(&self, config: &CacheConfig) -> Arc<dyn CacheStore<V>>;
}

/// Port for the storefront catalog API.
///
/// The location context travels with every call; the backend uses it to
/// scope availability and promotions to the shopper's warehouse.
#[async_trait]
pub trait CatalogBackend: Send + Sync + 'static {
    async fn fetch_categories(&self, ctx: &LocationContext) -> Result<Vec<Category>>;
    async fn fetch_brands(&self, ctx: &LocationContext) -> Result<Vec<Brand>>;
    async fn fetch_banners(&self, ctx: &LocationContext) -> Result<Vec<Banner>>;
    async fn fetch_special_banner(&self, ctx: &LocationContext) -> Result<SpecialBanner>;
    async fn fetch_products(&self, ctx: &LocationContext) -> Result<Vec<Product>>;
    /// Liveness probe against the backend.
    async fn health(&self) -> Result<()>;
}

/// Raw event bodies from one stream connection. Each item is the `data`
/// payload of a `stockUpdate` event; an `Err` item ends the connection.
pub type StockFrames = BoxStream<'static, Result<String>>;

/// Port for the long-lived stock push transport.
#[async_trait]
pub trait StockFeed: Send + Sync + 'static {
    async fn connect(&self) -> Result<StockFrames>;
}
