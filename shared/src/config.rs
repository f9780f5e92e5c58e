use tracing::warn;

/// Runtime configuration, read once from `MERCATO_*` environment variables.
pub struct Config {
    /// Base URL of the storefront backend API.
    pub api_base_url: String,
    /// URL of the stock push stream. Defaults to `<api_base_url>/stock/stream`.
    pub stream_url: String,
    /// Timeout applied to each catalog fetch.
    pub fetch_timeout_secs: u64,
    /// Total attempts per fetch (first try included).
    pub retry_attempts: u32,
    /// TTL for categories and brands.
    pub categories_ttl_secs: u64,
    /// TTL for banners and the special banner.
    pub banners_ttl_secs: u64,
    /// TTL for the location-scoped product listing.
    pub products_ttl_secs: u64,
    /// Interval of the background sweep over expired entries. `None` disables it.
    pub sweep_secs: Option<u64>,
    /// Delay before the stream client attempts to reconnect.
    pub reconnect_backoff_secs: u64,
    /// When set, the cache switches to the bounded backend with this capacity.
    pub cache_max_entries: Option<u64>,
    /// Pincode the agent warms on startup, if known.
    pub pincode: Option<String>,
    /// Whether the warehouse serves all locations without pincode restriction.
    pub global_mode: bool,
}

impl Config {
    const DEFAULT_API_BASE_URL: &str = "http://localhost:4000/api";
    const DEFAULT_CATEGORIES_TTL_SECS: u64 = 900;
    const DEFAULT_BANNERS_TTL_SECS: u64 = 600;
    const DEFAULT_PRODUCTS_TTL_SECS: u64 = 300;
    const DEFAULT_SWEEP_SECS: u64 = 300;

    pub fn from_env() -> Self {
        let api_base_url = std::env::var("MERCATO_API_BASE_URL").unwrap_or_else(|_| {
            warn!(
                "MERCATO_API_BASE_URL not set, using default {}",
                Self::DEFAULT_API_BASE_URL
            );
            Self::DEFAULT_API_BASE_URL.to_string()
        });
        let stream_url = std::env::var("MERCATO_STREAM_URL")
            .unwrap_or_else(|_| format!("{}/stock/stream", api_base_url.trim_end_matches('/')));

        Self {
            stream_url,
            api_base_url,
            fetch_timeout_secs: env_u64("MERCATO_FETCH_TIMEOUT_SECS", 10),
            retry_attempts: env_u64("MERCATO_RETRY_ATTEMPTS", 2) as u32,
            categories_ttl_secs: env_u64(
                "MERCATO_CATEGORIES_TTL_SECS",
                Self::DEFAULT_CATEGORIES_TTL_SECS,
            ),
            banners_ttl_secs: env_u64("MERCATO_BANNERS_TTL_SECS", Self::DEFAULT_BANNERS_TTL_SECS),
            products_ttl_secs: env_u64(
                "MERCATO_PRODUCTS_TTL_SECS",
                Self::DEFAULT_PRODUCTS_TTL_SECS,
            ),
            sweep_secs: match std::env::var("MERCATO_CACHE_SWEEP_SECS").ok() {
                Some(raw) if raw == "0" => None,
                Some(raw) => Some(raw.parse().unwrap_or(Self::DEFAULT_SWEEP_SECS)),
                None => Some(Self::DEFAULT_SWEEP_SECS),
            },
            reconnect_backoff_secs: env_u64("MERCATO_RECONNECT_BACKOFF_SECS", 3),
            cache_max_entries: std::env::var("MERCATO_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|raw| raw.parse().ok()),
            pincode: std::env::var("MERCATO_PINCODE").ok().filter(|p| !p.is_empty()),
            global_mode: std::env::var("MERCATO_GLOBAL_MODE")
                .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
