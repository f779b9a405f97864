//! Commerce backend store API client.
//!
//! # Architecture
//!
//! - The backend is the source of truth for products and prices; nothing is
//!   synced locally
//! - Prices are calculated per region, so a region id is mandatory
//! - Hydrated products are kept in a `moka` cache so search results can be
//!   upgraded to full products without refetching the same ids
//!
//! # Example
//!
//! ```rust,ignore
//! use mariquita_storefront::commerce::{CommerceClient, ProductListQuery};
//!
//! let client = CommerceClient::new(&config.commerce)?;
//! let page = client
//!     .list_products(&ProductListQuery { limit: 12, ..Default::default() })
//!     .await?;
//! ```

pub mod pricing;
pub mod types;

use std::sync::Arc;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};

use mariquita_core::ProductId;

use crate::config::CommerceConfig;

pub use pricing::{
    ProductPricing, compute_price_range, extract_cheapest_variant, extract_cheapest_weight,
    format_price, format_weight, parse_amount, resolve_product_pricing,
};
pub use types::{ProductList, ProductListQuery, StoreProduct, StoreVariant};

/// Fields requested on every listing so variants carry calculated prices.
const PRODUCT_FIELDS: &str = "*variants.calculated_price";

/// Header carrying the publishable key.
const PUBLISHABLE_KEY_HEADER: &str = "x-publishable-api-key";

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Commerce backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Prices cannot be calculated without a region.
    #[error("Missing pricing region: set COMMERCE_REGION_ID")]
    MissingRegion,
}

#[derive(serde::Deserialize)]
struct ProductListResponse {
    #[serde(default)]
    products: Vec<StoreProduct>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    offset: Option<u64>,
}

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the commerce backend store API.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    products_url: String,
    publishable_key: String,
    region_id: String,
    currency_code: String,
    products: Option<Cache<ProductId, StoreProduct>>,
}

impl std::fmt::Debug for CommerceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceClient")
            .field("products_url", &self.inner.products_url)
            .field("region_id", &self.inner.region_id)
            .finish_non_exhaustive()
    }
}

impl CommerceClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::MissingRegion` when no pricing region is configured.
    pub fn new(config: &CommerceConfig) -> Result<Self, CommerceError> {
        let region_id = config
            .region_id
            .clone()
            .ok_or(CommerceError::MissingRegion)?;

        let products = (!config.product_cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(config.product_cache_max)
                .time_to_idle(config.product_cache_ttl)
                .build()
        });

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client: reqwest::Client::new(),
                products_url: format!("{}/store/products", config.backend_url),
                publishable_key: config.publishable_key.clone(),
                region_id,
                currency_code: config.currency_code.clone(),
                products,
            }),
        })
    }

    /// Display currency code.
    #[must_use]
    pub fn currency_code(&self) -> &str {
        &self.inner.currency_code
    }

    /// List products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    #[instrument(skip(self, query), fields(limit = query.limit, offset = query.offset))]
    pub async fn list_products(&self, query: &ProductListQuery) -> Result<ProductList, CommerceError> {
        let params = query_pairs(query, &self.inner.region_id);

        let response = self
            .inner
            .client
            .get(&self.inner.products_url)
            .header(PUBLISHABLE_KEY_HEADER, &self.inner.publishable_key)
            .query(&params)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CommerceError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Commerce backend returned non-success status"
            );
            return Err(CommerceError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        let body: ProductListResponse = match serde_json::from_str(&response_text) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse product listing"
                );
                return Err(CommerceError::Parse(e));
            }
        };

        let count = body
            .count
            .unwrap_or_else(|| u64::try_from(body.products.len()).unwrap_or(u64::MAX));
        debug!(returned = body.products.len(), count, "Listed products");

        Ok(ProductList {
            count,
            limit: body.limit.unwrap_or(query.limit),
            offset: body.offset.unwrap_or(query.offset),
            products: body.products,
        })
    }

    /// Fetch full products by id in one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing request fails.
    pub async fn fetch_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<StoreProduct>, CommerceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = ProductListQuery {
            limit: u32::try_from(ids.len()).unwrap_or(u32::MAX),
            ids: ids.to_vec(),
            ..ProductListQuery::default()
        };
        Ok(self.list_products(&query).await?.products)
    }

    /// Replace partial products (e.g. converted search hits) with full ones.
    ///
    /// Products already seen are served from the cache; the rest are fetched
    /// in one request and cached. Order is preserved and products the backend
    /// did not return are kept as they are.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching the missing products fails.
    #[instrument(skip_all, fields(products = products.len()))]
    pub async fn hydrate_products(
        &self,
        products: Vec<StoreProduct>,
    ) -> Result<Vec<StoreProduct>, CommerceError> {
        if products.is_empty() {
            return Ok(products);
        }

        let mut replacements = std::collections::HashMap::new();
        let mut missing = Vec::new();

        for product in &products {
            if product.id.is_empty() {
                continue;
            }
            let cached = match &self.inner.products {
                Some(cache) => cache.get(&product.id).await,
                None => None,
            };
            match cached {
                Some(full) => {
                    replacements.insert(product.id.clone(), full);
                }
                None => missing.push(product.id.clone()),
            }
        }

        if !missing.is_empty() {
            debug!(missing = missing.len(), "Hydrating uncached products");
            for full in self.fetch_products_by_ids(&missing).await? {
                if full.id.is_empty() {
                    continue;
                }
                if let Some(cache) = &self.inner.products {
                    cache.insert(full.id.clone(), full.clone()).await;
                }
                replacements.insert(full.id.clone(), full);
            }
        }

        Ok(products
            .into_iter()
            .map(|product| replacements.get(&product.id).cloned().unwrap_or(product))
            .collect())
    }

    /// Drop every hydrated product.
    pub fn clear_product_cache(&self) {
        if let Some(cache) = &self.inner.products {
            cache.invalidate_all();
        }
    }
}

/// Query string pairs for a listing request.
fn query_pairs(query: &ProductListQuery, region_id: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("limit", query.limit.to_string()),
        ("offset", query.offset.to_string()),
        ("fields", PRODUCT_FIELDS.to_string()),
        ("region_id", region_id.to_string()),
    ];

    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        params.push(("q", q.to_string()));
    }
    params.extend(query.ids.iter().map(|id| ("id[]", id.to_string())));
    params.extend(query.category_ids.iter().map(|id| ("category_id[]", id.to_string())));
    params.extend(query.collection_ids.iter().map(|id| ("collection_id[]", id.to_string())));
    params.extend(query.tag_ids.iter().map(|id| ("tag_id[]", id.to_string())));
    params.extend(query.type_ids.iter().map(|id| ("type_id[]", id.to_string())));

    params
}
