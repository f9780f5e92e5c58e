use application::preloader::IntentSignal;
use application::queries::QueryPolicy;
use application::Application;
use application::value::CachedValue;
use client_http::{HttpCatalog, SseStockFeed};
use mercato::domain::{CacheConfig, LocationContext};
use mercato::ports::{CacheStore, CatalogBackend, StorageFactory};
use mercato::stock::StockStream;
use shared::config::Config;
use std::sync::Arc;
use std::time::Duration;
use storage_engine::StorageBackendFactory;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Mercato agent...");

    // Load environment variables from .env file (if exists)
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();

    let backend =
        Arc::new(HttpCatalog::from_config(&config).expect("failed to build HTTP client"));
    match backend.health().await {
        Ok(()) => info!("Backend reachable at {}", config.api_base_url),
        Err(e) => warn!("Backend health check failed: {} (fetches will retry)", e),
    }

    let mut cache_config = CacheConfig::new("catalog");
    cache_config.max_entries = config.cache_max_entries;
    cache_config.default_ttl = config
        .cache_max_entries
        .map(|_| Duration::from_secs(config.categories_ttl_secs));
    cache_config.sweep_interval = config.sweep_secs.map(Duration::from_secs);
    let store: Arc<dyn CacheStore<CachedValue>> = StorageBackendFactory.create(&cache_config);

    let app = Application::new(store, backend.clone(), QueryPolicy::from_config(&config));

    let feed =
        Arc::new(SseStockFeed::from_config(&config).expect("failed to build stream client"));
    let stream = StockStream::new(feed, Duration::from_secs(config.reconnect_backoff_secs));
    stream.clone().init();

    let _updates = stream.subscribe(|update| {
        info!(
            "stock update: product {} now at {} unit(s), {} variant(s)",
            update.product_id,
            update.stock,
            update.variant_stocks.len()
        );
    });

    if config.pincode.is_some() || config.global_mode {
        let ctx = LocationContext::new(config.pincode.clone(), config.global_mode);
        info!(
            "Warming catalog for pincode {:?} ({})",
            ctx.pincode,
            ctx.mode().as_str()
        );
        app.preloader.signal(IntentSignal::LocationResolved {
            pincode: ctx.pincode.clone(),
            global_mode: ctx.global_mode,
        });

        // Seed stock snapshots from the listing so readers have figures
        // before the first push arrives.
        match app.queries.products(&ctx).await {
            Ok(products) => {
                stream.seed_products(&products);
                info!("Seeded stock snapshots for {} product(s)", products.len());
            }
            Err(e) => warn!("Product listing fetch failed: {} (stream will fill in)", e),
        }
    }

    info!("Agent running; press Ctrl+C to stop");
    shutdown_signal().await;
    info!("Agent shutdown complete");
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
