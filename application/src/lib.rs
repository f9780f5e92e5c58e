// application/src/lib.rs
pub mod preloader;
pub mod queries;
pub mod value;

use mercato::ports::{CacheStore, CatalogBackend};
use preloader::Preloader;
use queries::{CatalogQueries, QueryPolicy};
use std::sync::Arc;
use value::CachedValue;

/// The assembled application services: the query layer and the preloader
/// warming it. Built once at startup and shared by reference; tests build
/// fresh instances instead of reaching for globals.
pub struct Application {
    pub queries: Arc<CatalogQueries>,
    pub preloader: Preloader,
}

impl Application {
    pub fn new(
        store: Arc<dyn CacheStore<CachedValue>>,
        backend: Arc<dyn CatalogBackend>,
        policy: QueryPolicy,
    ) -> Self {
        let queries = Arc::new(CatalogQueries::new(store, backend, policy));
        let preloader = Preloader::start(queries.clone(), Preloader::DEBOUNCE);
        Self { queries, preloader }
    }
}
