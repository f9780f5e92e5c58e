use mercato::domain::{Banner, Brand, Category, Product, SpecialBanner};
use shared::{Error, Result};

/// Typed payloads the catalog cache holds. One variant per resource, so a
/// cache read never needs to re-parse JSON.
#[derive(Clone, Debug)]
pub enum CachedValue {
    Categories(Vec<Category>),
    Brands(Vec<Brand>),
    Banners(Vec<Banner>),
    Special(SpecialBanner),
    Products(Vec<Product>),
}

impl CachedValue {
    pub fn into_categories(self) -> Result<Vec<Category>> {
        match self {
            CachedValue::Categories(categories) => Ok(categories),
            other => Err(wrong_variant("categories", &other)),
        }
    }

    pub fn into_brands(self) -> Result<Vec<Brand>> {
        match self {
            CachedValue::Brands(brands) => Ok(brands),
            other => Err(wrong_variant("brands", &other)),
        }
    }

    pub fn into_banners(self) -> Result<Vec<Banner>> {
        match self {
            CachedValue::Banners(banners) => Ok(banners),
            other => Err(wrong_variant("banners", &other)),
        }
    }

    pub fn into_special(self) -> Result<SpecialBanner> {
        match self {
            CachedValue::Special(banner) => Ok(banner),
            other => Err(wrong_variant("special banner", &other)),
        }
    }

    pub fn into_products(self) -> Result<Vec<Product>> {
        match self {
            CachedValue::Products(products) => Ok(products),
            other => Err(wrong_variant("products", &other)),
        }
    }
}

// Only reachable if a resource writes another resource's key, which the
// key derivation rules out; kept as an error rather than a panic.
fn wrong_variant(wanted: &str, got: &CachedValue) -> Error {
    Error::Internal(format!("cache entry for {wanted} held {got:?}"))
}
