use crate::queries::CatalogQueries;
use mercato::domain::LocationContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// User-intent signals that make warming the cache worthwhile before any
/// navigation happens.
#[derive(Clone, Debug)]
pub enum IntentSignal {
    /// Location detection finished; the delivery context is now known.
    LocationResolved {
        pincode: Option<String>,
        global_mode: bool,
    },
    /// Pointer hovering over a navigate-home affordance.
    HomeHover,
}

/// Fire-and-forget cache warmer.
///
/// Signals are debounced briefly so warming never competes with the
/// fetches of the render that produced them, and every warming failure is
/// swallowed: this is an optimization, not a delivery guarantee. Consumers
/// that need the data reliably call `CatalogQueries` themselves.
pub struct Preloader {
    signals: mpsc::Sender<IntentSignal>,
}

impl Preloader {
    pub const DEBOUNCE: Duration = Duration::from_millis(100);

    pub fn start(queries: Arc<CatalogQueries>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run(queries, rx, debounce));
        Self { signals: tx }
    }

    /// Hand in a signal without waiting. Dropped if the warming task is
    /// saturated, which is fine for an optimization.
    pub fn signal(&self, signal: IntentSignal) {
        if self.signals.try_send(signal).is_err() {
            debug!("intent signal dropped, warming task saturated");
        }
    }
}

async fn run(
    queries: Arc<CatalogQueries>,
    mut rx: mpsc::Receiver<IntentSignal>,
    debounce: Duration,
) {
    let mut ctx: Option<LocationContext> = None;
    while let Some(signal) = rx.recv().await {
        apply_signal(&mut ctx, signal);

        tokio::time::sleep(debounce).await;
        // Collapse a burst of signals into one warming pass.
        while let Ok(signal) = rx.try_recv() {
            apply_signal(&mut ctx, signal);
        }

        match ctx.clone() {
            Some(ctx) => warm(&queries, &ctx).await,
            None => debug!("intent signal before location resolved, nothing to warm"),
        }
    }
}

fn apply_signal(ctx: &mut Option<LocationContext>, signal: IntentSignal) {
    match signal {
        IntentSignal::LocationResolved {
            pincode,
            global_mode,
        } => *ctx = Some(LocationContext::new(pincode, global_mode)),
        IntentSignal::HomeHover => {}
    }
}

async fn warm(queries: &CatalogQueries, ctx: &LocationContext) {
    debug!(
        "warming catalog cache for pincode {:?} ({})",
        ctx.pincode,
        ctx.mode().as_str()
    );
    if let Err(e) = queries.categories(ctx).await {
        debug!("categories warm skipped: {}", e);
    }
    if let Err(e) = queries.brands(ctx).await {
        debug!("brands warm skipped: {}", e);
    }
    if let Err(e) = queries.banners(ctx).await {
        debug!("banners warm skipped: {}", e);
    }
    if let Err(e) = queries.special_banner(ctx).await {
        debug!("special banner warm skipped: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::QueryPolicy;
    use crate::value::CachedValue;
    use async_trait::async_trait;
    use mercato::domain::{Banner, Brand, Category, Product, SpecialBanner};
    use mercato::ports::CatalogBackend;
    use shared::{Error, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage_engine::TtlMap;
    use tokio::time::sleep;

    struct CountingBackend {
        calls: AtomicUsize,
        failing: bool,
    }

    impl CountingBackend {
        fn new(failing: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing,
            })
        }

        fn step<T>(&self, value: T) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                Err(Error::Status(503))
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl CatalogBackend for CountingBackend {
        async fn fetch_categories(&self, _ctx: &LocationContext) -> Result<Vec<Category>> {
            self.step(Vec::new())
        }

        async fn fetch_brands(&self, _ctx: &LocationContext) -> Result<Vec<Brand>> {
            self.step(Vec::new())
        }

        async fn fetch_banners(&self, _ctx: &LocationContext) -> Result<Vec<Banner>> {
            self.step(Vec::new())
        }

        async fn fetch_special_banner(&self, _ctx: &LocationContext) -> Result<SpecialBanner> {
            self.step(SpecialBanner {
                id: "s1".into(),
                image_url: "https://cdn.example/s.webp".into(),
                target_url: None,
                active: true,
            })
        }

        async fn fetch_products(&self, _ctx: &LocationContext) -> Result<Vec<Product>> {
            self.step(Vec::new())
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }
    }

    fn build(backend: Arc<CountingBackend>) -> Arc<CatalogQueries> {
        let store: Arc<TtlMap<CachedValue>> = Arc::new(TtlMap::new());
        Arc::new(CatalogQueries::new(store, backend, QueryPolicy::default()))
    }

    #[tokio::test]
    async fn location_signal_warms_every_resource() {
        let backend = CountingBackend::new(false);
        let queries = build(backend.clone());
        let preloader = Preloader::start(queries.clone(), Duration::from_millis(10));

        preloader.signal(IntentSignal::LocationResolved {
            pincode: Some("302001".into()),
            global_mode: false,
        });
        sleep(Duration::from_millis(120)).await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);

        // The warm pass and a real caller share the same keys.
        queries
            .categories(&LocationContext::local("302001"))
            .await
            .unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn hover_before_location_is_a_noop() {
        let backend = CountingBackend::new(false);
        let preloader = Preloader::start(build(backend.clone()), Duration::from_millis(10));

        preloader.signal(IntentSignal::HomeHover);
        sleep(Duration::from_millis(80)).await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hover_after_location_hits_the_warm_cache() {
        let backend = CountingBackend::new(false);
        let preloader = Preloader::start(build(backend.clone()), Duration::from_millis(10));

        preloader.signal(IntentSignal::LocationResolved {
            pincode: Some("302001".into()),
            global_mode: false,
        });
        sleep(Duration::from_millis(80)).await;
        let after_location = backend.calls.load(Ordering::SeqCst);

        preloader.signal(IntentSignal::HomeHover);
        sleep(Duration::from_millis(80)).await;

        // Everything is still warm, so the hover pass hits only the cache.
        assert_eq!(backend.calls.load(Ordering::SeqCst), after_location);
    }

    #[tokio::test]
    async fn warming_failures_are_swallowed() {
        let backend = CountingBackend::new(true);
        let preloader = Preloader::start(build(backend.clone()), Duration::from_millis(10));

        preloader.signal(IntentSignal::LocationResolved {
            pincode: None,
            global_mode: true,
        });
        sleep(Duration::from_millis(120)).await;

        // Every resource was attempted (with a retry each) and the task
        // is still alive to accept further signals.
        assert!(backend.calls.load(Ordering::SeqCst) >= 4);
        preloader.signal(IntentSignal::HomeHover);
    }
}
