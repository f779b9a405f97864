//! Catalog query engine.
//!
//! A [`CatalogFilterSet`] describes what the shopper is looking at. Its
//! [`FilterSignature`] is the canonical identity used for caching: two filter
//! sets that differ only in id order or duplicates share one signature.
//!
//! Pages come from a [`CatalogSource`] (commerce backend or search index,
//! optionally wrapped in the shared [`CachedCatalogSource`]). A
//! [`CatalogController`] drives one consumer's view: debounced filter
//! changes, per-signature page reuse, "load more" pagination, and
//! cancellation of superseded fetches.

mod card;
mod controller;
mod source;

use mariquita_core::{
    CategoryId, CollectionId, PriceRange, ProductStatus, ProductTypeId, TagId,
    merge_price_ranges,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::commerce::{CommerceError, StoreProduct};
use crate::search::SearchError;

pub use card::{CardPricing, CardView, ProductCard};
pub use controller::{CatalogController, CatalogStatus, CatalogView, DEFAULT_DEBOUNCE};
pub use source::{CachedCatalogSource, CatalogSource, CommerceCatalogSource, SearchCatalogSource};

/// Page size used when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Message shown to shoppers when a catalog fetch fails.
pub const CATALOG_ERROR_MESSAGE: &str = "We couldn't load the catalog. Please try again.";

/// Errors raised while fetching catalog pages.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("commerce backend: {0}")]
    Commerce(#[from] CommerceError),

    #[error("search service: {0}")]
    Search(#[from] SearchError),

    #[error("invalid cache key: {0}")]
    CacheKey(#[from] serde_json::Error),

    /// A failure shared by every caller of one de-duplicated load.
    #[error(transparent)]
    Shared(std::sync::Arc<CatalogError>),
}

/// The shopper's current catalog selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilterSet {
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<CollectionId>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    #[serde(default)]
    pub type_ids: Vec<ProductTypeId>,
    /// Variant weight in grams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
    pub limit: u32,
    #[serde(default)]
    pub status: ProductStatus,
}

impl Default for CatalogFilterSet {
    fn default() -> Self {
        Self {
            category_ids: Vec::new(),
            collection_id: None,
            tag_ids: Vec::new(),
            type_ids: Vec::new(),
            weight: None,
            limit: DEFAULT_PAGE_SIZE,
            status: ProductStatus::default(),
        }
    }
}

fn sorted_unique<T: Ord + Clone>(ids: &[T]) -> Vec<T> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();
    ids
}

impl CatalogFilterSet {
    /// Canonical identity of this selection.
    ///
    /// Id lists are sorted and de-duplicated; absent selectors are `null`, so
    /// an absent collection and an explicit "no collection" are the same.
    #[must_use]
    pub fn signature(&self) -> FilterSignature {
        let canonical = json!({
            "categories": sorted_unique(&self.category_ids),
            "collection": self.collection_id,
            "tags": sorted_unique(&self.tag_ids),
            "types": sorted_unique(&self.type_ids),
            "weight": self.weight.map(|w| w.normalize().to_string()),
            "limit": self.limit,
            "status": self.status,
        });
        FilterSignature(canonical.to_string())
    }

    /// Copy with id lists sorted and de-duplicated.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            category_ids: sorted_unique(&self.category_ids),
            tag_ids: sorted_unique(&self.tag_ids),
            type_ids: sorted_unique(&self.type_ids),
            ..self.clone()
        }
    }
}

/// Canonical cache identity of a [`CatalogFilterSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterSignature(String);

impl FilterSignature {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FilterSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The accumulated products for one filter signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResultPage {
    pub products: Vec<StoreProduct>,
    /// Total matches reported by the source; may exceed `products.len()`.
    pub count: u64,
    pub limit: u32,
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

impl CatalogResultPage {
    /// A page with no products.
    #[must_use]
    pub const fn empty(limit: u32) -> Self {
        Self {
            products: Vec::new(),
            count: 0,
            limit,
            offset: 0,
            price_range: None,
        }
    }

    /// Number of products held, as an offset.
    #[must_use]
    pub fn loaded(&self) -> u64 {
        u64::try_from(self.products.len()).unwrap_or(u64::MAX)
    }

    /// Whether the source reports more products than are loaded.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.loaded() < self.count
    }

    /// Append the next page: products are concatenated, the count and limit
    /// follow the newer page, and the price range only widens.
    #[must_use]
    pub fn append(mut self, next: Self) -> Self {
        self.products.extend(next.products);
        self.count = next.count;
        self.limit = next.limit;
        self.price_range = merge_price_ranges(self.price_range, next.price_range);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn page(ids: &[&str], count: u64, range: Option<(i64, i64)>) -> CatalogResultPage {
        CatalogResultPage {
            products: ids
                .iter()
                .map(|id| serde_json::from_value(json!({"id": id})).unwrap())
                .collect(),
            count,
            limit: 2,
            offset: 0,
            price_range: range.map(|(min, max)| PriceRange::new(min.into(), max.into())),
        }
    }

    #[test]
    fn test_signature_ignores_order_and_duplicates() {
        let a = CatalogFilterSet {
            category_ids: vec![CategoryId::new("b"), CategoryId::new("a")],
            ..CatalogFilterSet::default()
        };
        let b = CatalogFilterSet {
            category_ids: vec![CategoryId::new("a"), CategoryId::new("b"), CategoryId::new("a")],
            ..CatalogFilterSet::default()
        };
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.normalized().category_ids, b.normalized().category_ids);
    }

    #[test]
    fn test_signature_distinguishes_selectors() {
        let base = CatalogFilterSet::default();
        let weighted = CatalogFilterSet {
            weight: Some(Decimal::from(250)),
            ..CatalogFilterSet::default()
        };
        let draft = CatalogFilterSet {
            status: ProductStatus::Draft,
            ..CatalogFilterSet::default()
        };
        assert_ne!(base.signature(), weighted.signature());
        assert_ne!(base.signature(), draft.signature());
    }

    #[test]
    fn test_signature_shape() {
        let signature = CatalogFilterSet::default().signature();
        let value: serde_json::Value = serde_json::from_str(signature.as_str()).unwrap();
        assert_eq!(value["collection"], serde_json::Value::Null);
        assert_eq!(value["weight"], serde_json::Value::Null);
        assert_eq!(value["status"], "published");
        assert_eq!(value["limit"], 12);
    }

    #[test]
    fn test_equal_weights_share_signature() {
        let a = CatalogFilterSet {
            weight: Some(Decimal::new(2500, 1)),
            ..CatalogFilterSet::default()
        };
        let b = CatalogFilterSet {
            weight: Some(Decimal::from(250)),
            ..CatalogFilterSet::default()
        };
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_append_widens_price_range() {
        let merged = page(&["p1", "p2"], 5, Some((5, 20))).append(page(&["p3"], 5, Some((2, 25))));
        assert_eq!(merged.products.len(), 3);
        assert_eq!(merged.offset, 0);
        assert_eq!(merged.price_range, Some(PriceRange::new(2.into(), 25.into())));
        assert!(merged.has_more());
    }

    #[test]
    fn test_append_keeps_range_when_next_has_none() {
        let merged = page(&["p1"], 2, Some((5, 20))).append(page(&["p2"], 2, None));
        assert_eq!(merged.price_range, Some(PriceRange::new(5.into(), 20.into())));
        assert!(!merged.has_more());
    }

    #[test]
    fn test_result_page_json_shape() {
        let value = serde_json::to_value(page(&["p1"], 1, Some((1, 2)))).unwrap();
        assert!(value.get("priceRange").is_some());
        assert_eq!(value["count"], 1);
    }
}
