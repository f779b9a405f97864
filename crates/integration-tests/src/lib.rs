//! Integration tests for Mariquita.
//!
//! The storefront's backends (commerce store API and search index) are
//! replaced by `wiremock` servers, and the router is driven in-process with
//! `tower::ServiceExt::oneshot`, so no real network traffic leaves the test.
//!
//! This crate only holds the shared fixtures; the tests live in `tests/`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use mariquita_storefront::config::{CommerceConfig, MediaConfig, SearchConfig, StorefrontConfig};
use mariquita_storefront::state::AppState;

/// Region every fixture prices in.
pub const REGION_ID: &str = "reg_test";

/// Publishable key sent by the commerce client.
pub const PUBLISHABLE_KEY: &str = "pk_test_storefront";

/// Search API key.
pub const SEARCH_API_KEY: &str = "search-key";

/// Commerce settings pointing at `backend_url`, with the product cache on.
#[must_use]
pub fn commerce_config(backend_url: &str) -> CommerceConfig {
    CommerceConfig {
        backend_url: backend_url.trim_end_matches('/').to_string(),
        publishable_key: PUBLISHABLE_KEY.to_string(),
        region_id: Some(REGION_ID.to_string()),
        currency_code: "EUR".to_string(),
        product_cache_ttl: Duration::from_secs(60),
        product_cache_max: 100,
    }
}

/// Search settings pointing at `host`.
#[must_use]
pub fn search_config(host: &str) -> SearchConfig {
    SearchConfig {
        host: host.trim_end_matches('/').to_string(),
        api_key: SecretString::from(SEARCH_API_KEY),
        index: "products".to_string(),
    }
}

/// Media proxy settings with a fixed secret.
#[must_use]
pub fn media_config() -> MediaConfig {
    MediaConfig {
        secret: SecretString::from("integration-media-secret"),
        base_url: "https://img.example.test".to_string(),
        ops_path: "fit-in/800x800".to_string(),
    }
}

/// Storefront settings with only the commerce backend configured.
///
/// The catalog cache is disabled so every request reaches the mock server.
#[must_use]
pub fn storefront_config(backend_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        commerce: commerce_config(backend_url),
        search: None,
        media: None,
        catalog_cache_ttl: Duration::ZERO,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Build the full storefront router for `config`.
///
/// # Panics
///
/// Panics if the state cannot be built (missing region).
#[must_use]
pub fn app(config: StorefrontConfig) -> Router {
    let state = AppState::new(config).expect("failed to build app state");
    mariquita_storefront::app(state)
}

/// Send one request through `app`.
///
/// # Panics
///
/// Panics if the router fails, which it never does for a valid request.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

/// `GET uri`, optionally with a session cookie.
///
/// # Panics
///
/// Panics if the request cannot be built.
#[must_use]
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).expect("valid request")
}

/// `POST uri` with a JSON body, optionally with a session cookie.
///
/// # Panics
///
/// Panics if the request cannot be built.
#[must_use]
pub fn post_json(uri: &str, body: &Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// Read a response body as JSON.
///
/// # Panics
///
/// Panics if the body cannot be read or is not JSON.
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

/// The `name=value` part of the response's `Set-Cookie` header.
#[must_use]
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get("set-cookie")?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

// =============================================================================
// Fixtures
// =============================================================================

/// A store product with one variant per `(variant_id, grams, amount)`.
#[must_use]
pub fn product_json(id: &str, title: &str, variants: &[(&str, u32, f64)]) -> Value {
    json!({
        "id": id,
        "title": title,
        "handle": title.to_lowercase().replace(' ', "-"),
        "thumbnail": format!("https://cdn.example.test/{id}.webp"),
        "status": "published",
        "variants": variants
            .iter()
            .map(|(variant_id, grams, amount)| json!({
                "id": variant_id,
                "title": format!("{grams} g"),
                "weight": grams,
                "calculated_price": {
                    "calculated_amount": amount,
                    "original_amount": amount,
                },
            }))
            .collect::<Vec<_>>(),
    })
}

/// A store API listing body.
#[must_use]
pub fn listing_json(products: Vec<Value>, count: u64, limit: u32, offset: u64) -> Value {
    json!({
        "products": products,
        "count": count,
        "limit": limit,
        "offset": offset,
    })
}

/// A search index hit.
#[must_use]
pub fn hit_json(id: &str, title: &str, min_price: f64) -> Value {
    json!({
        "id": id,
        "title": title,
        "handle": title.to_lowercase().replace(' ', "-"),
        "min_price": min_price,
        "max_price": min_price,
        "currency_code": "eur",
        "status": "published",
        "category_names": ["Fruta deshidratada"],
    })
}
