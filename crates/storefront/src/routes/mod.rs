//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness with enabled features
//!
//! # Catalog
//! GET  /api/catalog.json                - Filtered, paginated product listing
//! GET  /api/catalog/weights             - Weight labels offered by a collection
//!
//! # Search
//! GET  /api/search.json                 - Full-text search, hydrated products
//! GET  /api/search/suggestions.json     - Search-as-you-type product cards
//!
//! # Cart (session-backed JSON)
//! GET  /api/cart                        - Items and summary
//! POST /api/cart/items                  - Add item
//! POST /api/cart/items/increase         - Quantity + 1
//! POST /api/cart/items/decrease         - Quantity - 1 (floor 1)
//! POST /api/cart/items/remove           - Remove item
//! POST /api/cart/items/variant          - Switch an item to another variant
//! POST /api/cart/clear                  - Empty the cart
//! GET  /api/cart/count                  - Badge counts
//! GET  /api/checkout/summary            - Totals for checkout
//!
//! # Media
//! GET  /media/{file}                    - Redirect to the signed image proxy URL
//! ```

pub mod cart;
pub mod catalog;
pub mod health;
pub mod media;
pub mod search;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the catalog and search API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog.json", get(catalog::catalog))
        .route("/catalog/weights", get(catalog::weights))
        .route("/search.json", get(search::search))
        .route("/search/suggestions.json", get(search::suggestions))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add))
        .route("/items/increase", post(cart::increase))
        .route("/items/decrease", post(cart::decrease))
        .route("/items/remove", post(cart::remove))
        .route("/items/variant", post(cart::change_variant))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
        .nest("/api/cart", cart_routes())
        .route("/api/checkout/summary", get(cart::checkout_summary))
        .route("/media/{file}", get(media::redirect))
}

/// Query string pairs in order, with repeated keys preserved.
#[derive(Debug, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse a raw query string.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        Self(
            url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
                .into_owned()
                .collect(),
        )
    }

    /// First value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed, non-empty, de-duplicated ids from any of `keys`.
    ///
    /// Values may be repeated or comma separated; first occurrence order is kept.
    #[must_use]
    pub fn id_list(&self, keys: &[&str]) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for (_, value) in self.0.iter().filter(|(k, _)| keys.contains(&k.as_str())) {
            for id in value.split(',').map(str::trim).filter(|id| !id.is_empty()) {
                if !ids.iter().any(|seen| seen == id) {
                    ids.push(id.to_string());
                }
            }
        }
        ids
    }

    /// Integer value of `key`; missing or unparseable values are `None`.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<i64> {
        let value = self.get(key)?.trim();
        value
            .parse::<i64>()
            .ok()
            .or_else(|| value.parse::<f64>().ok().filter(|n| n.is_finite()).map(truncate))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(n: f64) -> i64 {
    n.trunc() as i64
}
