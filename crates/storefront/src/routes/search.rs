//! Product search endpoints.

use axum::{
    Json,
    extract::{RawQuery, State},
};
use serde::Serialize;
use tracing::instrument;

use mariquita_core::{CategoryId, CollectionId, ProductStatus};

use super::QueryParams;
use crate::catalog::{CatalogFilterSet, ProductCard};
use crate::commerce::{ProductListQuery, StoreProduct};
use crate::error::{AppError, Result};
use crate::search::{build_filter_expression, hit_to_product};
use crate::state::AppState;

/// Results per request when none is requested.
pub const DEFAULT_SEARCH_LIMIT: u32 = 6;

/// Largest page a client may request.
pub const MAX_SEARCH_LIMIT: u32 = 12;

/// Query that lists every product instead of searching.
const WILDCARD_QUERY: &str = "*";

/// A parsed search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub limit: u32,
    pub offset: u64,
    pub category_ids: Vec<CategoryId>,
    pub collection_ids: Vec<CollectionId>,
    pub status: Option<ProductStatus>,
}

impl SearchRequest {
    /// Parse query parameters.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown `status`.
    pub fn parse(params: &QueryParams) -> Result<Self> {
        let limit = params
            .number("limit")
            .filter(|n| *n > 0)
            .map_or(DEFAULT_SEARCH_LIMIT, |n| {
                u32::try_from(n.min(i64::from(MAX_SEARCH_LIMIT))).unwrap_or(DEFAULT_SEARCH_LIMIT)
            });
        let offset = params
            .number("offset")
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);
        let status = params
            .get("status")
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<ProductStatus>)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(Self {
            query: params.get("q").unwrap_or_default().trim().to_string(),
            limit,
            offset,
            category_ids: params
                .id_list(&["category_id"])
                .into_iter()
                .map(CategoryId::new)
                .collect(),
            collection_ids: params
                .id_list(&["collection_id"])
                .into_iter()
                .map(CollectionId::new)
                .collect(),
            status,
        })
    }

    /// Filters for the search index.
    ///
    /// The index filter takes one collection; only the first narrows results.
    fn filters(&self) -> CatalogFilterSet {
        CatalogFilterSet {
            category_ids: self.category_ids.clone(),
            collection_id: self.collection_ids.first().cloned(),
            limit: self.limit,
            status: self.status.unwrap_or_default(),
            ..CatalogFilterSet::default()
        }
    }
}

/// Search results.
#[derive(Debug, Default, Serialize)]
pub struct SearchResponse {
    pub products: Vec<StoreProduct>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// `GET /api/search.json`
///
/// An empty query returns no products. `*` lists the catalog directly from
/// the commerce backend. Anything else goes to the search index and the hits
/// are upgraded to full products.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<SearchResponse>> {
    let request = SearchRequest::parse(&QueryParams::parse(query.as_deref()))?;

    if request.query.is_empty() {
        return Ok(Json(SearchResponse::default()));
    }

    if request.query == WILDCARD_QUERY {
        let list = state
            .commerce()
            .list_products(&ProductListQuery {
                limit: request.limit,
                offset: request.offset,
                category_ids: request.category_ids.clone(),
                collection_ids: request.collection_ids.clone(),
                ..ProductListQuery::default()
            })
            .await?;

        return Ok(Json(SearchResponse {
            products: list.products,
            count: Some(list.count),
            limit: Some(list.limit),
            offset: Some(list.offset),
        }));
    }

    let search = state.search().ok_or(AppError::Unavailable("Search"))?;
    let filter = build_filter_expression(&request.filters());
    let results = search
        .search(&request.query, filter.as_deref(), request.offset, request.limit)
        .await?;

    let products: Vec<StoreProduct> = results
        .hits
        .iter()
        .map(|hit| hit_to_product(hit, None))
        .filter(|product| !product.id.is_empty())
        .collect();
    let products = state.commerce().hydrate_products(products).await?;

    Ok(Json(SearchResponse {
        products,
        count: Some(results.estimated_total_hits),
        limit: Some(results.limit),
        offset: Some(results.offset),
    }))
}

/// Suggestion cards.
#[derive(Debug, Default, Serialize)]
pub struct SuggestionsResponse {
    pub cards: Vec<ProductCard>,
}

/// `GET /api/search/suggestions.json`
///
/// Cards straight from the index, without hydration, for search-as-you-type.
#[instrument(skip(state))]
pub async fn suggestions(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<SuggestionsResponse>> {
    let request = SearchRequest::parse(&QueryParams::parse(query.as_deref()))?;
    if request.query.is_empty() {
        return Ok(Json(SuggestionsResponse::default()));
    }

    let search = state.search().ok_or(AppError::Unavailable("Search"))?;
    let filter = build_filter_expression(&request.filters());
    let results = search
        .search(&request.query, filter.as_deref(), 0, request.limit)
        .await?;

    let currency = state.commerce().currency_code();
    let cards = results
        .hits
        .into_iter()
        .map(|hit| ProductCard::from_search(hit, currency))
        .collect();

    Ok(Json(SuggestionsResponse { cards }))
}
