use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How a warehouse fulfils orders: serving every location, or only the
/// pincodes it is registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Global,
    Local,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Global => "global",
            DeliveryMode::Local => "local",
        }
    }
}

/// The semantic tuple every location-scoped operation takes: the shopper's
/// pincode (when detected) and the active delivery mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationContext {
    pub pincode: Option<String>,
    pub global_mode: bool,
}

impl LocationContext {
    pub fn new(pincode: Option<String>, global_mode: bool) -> Self {
        Self {
            pincode,
            global_mode,
        }
    }

    /// Context for a shopper whose pincode resolved to local fulfilment.
    pub fn local(pincode: impl Into<String>) -> Self {
        Self::new(Some(pincode.into()), false)
    }

    /// Context for global-mode delivery, with or without a known pincode.
    pub fn global(pincode: Option<String>) -> Self {
        Self::new(pincode, true)
    }

    pub fn mode(&self) -> DeliveryMode {
        if self.global_mode {
            DeliveryMode::Global
        } else {
            DeliveryMode::Local
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// A scheduled promotional banner. Banners outside their validity window
/// are still delivered by the backend; `is_live` lets consumers filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: String,
    pub title: String,
    pub image_url: String,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl Banner {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        let started = self.starts_at.map(|s| s <= now).unwrap_or(true);
        let not_ended = self.ends_at.map(|e| now <= e).unwrap_or(true);
        started && not_ended
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialBanner {
    pub id: String,
    pub image_url: String,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// A sellable product as delivered by the location-scoped listing. The
/// embedded stock figures are a point-in-time snapshot; the stock stream
/// overrides them once it has data for the product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub price: f64,
    #[serde(default)]
    pub mrp: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub variant_stocks: HashMap<String, u32>,
}

/// The most recently known authoritative stock figures for one product.
/// Written only by the stock stream client, on a push or an explicit seed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StockSnapshot {
    pub stock: u32,
    pub variant_stocks: HashMap<String, u32>,
}

/// Configuration handed to the storage factory when building a cache store.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub name: String,
    /// `Some` switches to the bounded backend with this capacity.
    pub max_entries: Option<u64>,
    /// Global TTL for the bounded backend, which has no per-entry expiry.
    pub default_ttl: Option<Duration>,
    /// Interval of the expired-entry sweep on the unbounded backend.
    pub sweep_interval: Option<Duration>,
}

impl CacheConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_entries: None,
            default_ttl: None,
            sweep_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn banner_window() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let open = Banner {
            id: "b1".into(),
            title: "Summer sale".into(),
            image_url: "https://cdn.example/summer.webp".into(),
            target_url: None,
            position: 0,
            starts_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
            ends_at: Some(Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap()),
        };
        assert!(open.is_live(now));

        let ended = Banner {
            ends_at: Some(Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap()),
            ..open.clone()
        };
        assert!(!ended.is_live(now));

        let unbounded = Banner {
            starts_at: None,
            ends_at: None,
            ..open
        };
        assert!(unbounded.is_live(now));
    }

    #[test]
    fn context_mode() {
        assert_eq!(LocationContext::local("302001").mode(), DeliveryMode::Local);
        assert_eq!(LocationContext::global(None).mode(), DeliveryMode::Global);
    }
}
