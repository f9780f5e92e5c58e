use crate::{map_reqwest_error, map_status};
use async_trait::async_trait;
use mercato::domain::{Banner, Brand, Category, LocationContext, Product, SpecialBanner};
use mercato::ports::CatalogBackend;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// JSON/HTTP adapter for the storefront catalog API.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &shared::config::Config) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.fetch_timeout_secs),
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        ctx: Option<&LocationContext>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(ctx) = ctx {
            if let Some(pincode) = &ctx.pincode {
                request = request.query(&[("pincode", pincode.as_str())]);
            }
            request = request.query(&[("mode", ctx.mode().as_str())]);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

#[async_trait]
impl CatalogBackend for HttpCatalog {
    async fn fetch_categories(&self, ctx: &LocationContext) -> Result<Vec<Category>> {
        self.get_json("/categories", Some(ctx)).await
    }

    async fn fetch_brands(&self, ctx: &LocationContext) -> Result<Vec<Brand>> {
        self.get_json("/brands", Some(ctx)).await
    }

    async fn fetch_banners(&self, ctx: &LocationContext) -> Result<Vec<Banner>> {
        self.get_json("/banners", Some(ctx)).await
    }

    async fn fetch_special_banner(&self, ctx: &LocationContext) -> Result<SpecialBanner> {
        self.get_json("/banners/special", Some(ctx)).await
    }

    async fn fetch_products(&self, ctx: &LocationContext) -> Result<Vec<Product>> {
        self.get_json("/products", Some(ctx)).await
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(map_status(status))
        }
    }
}
