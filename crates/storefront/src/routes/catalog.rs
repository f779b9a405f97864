//! Catalog listing endpoints.

use axum::{
    Json,
    extract::{RawQuery, State},
};
use serde::Serialize;
use tracing::instrument;

use mariquita_core::{CategoryId, CollectionId, PriceRange, ProductStatus, ProductTypeId, TagId};

use super::QueryParams;
use crate::catalog::{CatalogFilterSet, CatalogResultPage, CatalogSource, DEFAULT_PAGE_SIZE};
use crate::commerce::StoreProduct;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: u32 = 60;

/// Catalog page as returned to the browser.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub products: Vec<StoreProduct>,
    pub count: u64,
    pub limit: u32,
    pub offset: u64,
    pub price_range: PriceRange,
}

impl From<CatalogResultPage> for CatalogResponse {
    fn from(page: CatalogResultPage) -> Self {
        Self {
            products: page.products,
            count: page.count,
            limit: page.limit,
            offset: page.offset,
            price_range: page.price_range.unwrap_or_default(),
        }
    }
}

/// Filters and offset of a catalog request.
///
/// Several collections may be given, but only the first narrows results.
/// `status` is validated the same way as on the search endpoint.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an unknown `status`.
pub fn parse_catalog_request(params: &QueryParams) -> Result<(CatalogFilterSet, u64)> {
    let limit = params
        .number("limit")
        .map_or(DEFAULT_PAGE_SIZE, |n| {
            u32::try_from(n.clamp(1, i64::from(MAX_PAGE_SIZE))).unwrap_or(DEFAULT_PAGE_SIZE)
        });
    let offset = params
        .number("offset")
        .map_or(0, |n| u64::try_from(n).unwrap_or(0));
    let status = params
        .get("status")
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<ProductStatus>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .unwrap_or_default();

    let filters = CatalogFilterSet {
        category_ids: params
            .id_list(&["category_id"])
            .into_iter()
            .map(CategoryId::new)
            .collect(),
        collection_id: params
            .id_list(&["collection_id", "collection"])
            .into_iter()
            .next()
            .map(CollectionId::new),
        tag_ids: params
            .id_list(&["tag_id", "tag", "tags"])
            .into_iter()
            .map(TagId::new)
            .collect(),
        type_ids: params
            .id_list(&["type_id", "type"])
            .into_iter()
            .map(ProductTypeId::new)
            .collect(),
        status,
        limit,
        ..CatalogFilterSet::default()
    };

    Ok((filters, offset))
}

/// `GET /api/catalog.json`
#[instrument(skip(state))]
pub async fn catalog(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<CatalogResponse>> {
    let params = QueryParams::parse(query.as_deref());
    let (filters, offset) = parse_catalog_request(&params)?;

    let page = state.commerce_catalog().fetch_page(&filters, offset).await?;
    Ok(Json(page.into()))
}

/// Weight labels response.
#[derive(Debug, Serialize)]
pub struct WeightsResponse {
    pub weights: Vec<String>,
}

/// `GET /api/catalog/weights?collection_id=`
///
/// Weight filters are an enhancement: any failure yields an empty list.
#[instrument(skip(state))]
pub async fn weights(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Json<WeightsResponse> {
    let params = QueryParams::parse(query.as_deref());
    let collection = params
        .id_list(&["collection_id", "collection"])
        .into_iter()
        .next()
        .map(CollectionId::new);

    let weights = match (state.search(), collection) {
        (Some(search), Some(collection)) => search
            .available_weights_for_collection(&collection)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load collection weights");
                Vec::new()
            }),
        _ => Vec::new(),
    };

    Json(WeightsResponse { weights })
}
