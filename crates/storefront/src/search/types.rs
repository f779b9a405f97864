//! Search index document projection.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commerce::parse_amount;

/// Attributes requested for every product search.
pub const SEARCH_PRODUCT_ATTRIBUTES: &[&str] = &[
    "id",
    "objectID",
    "title",
    "description",
    "handle",
    "thumbnail",
    "min_price",
    "max_price",
    "currency_code",
    "category_ids",
    "category_names",
    "tag_values",
    "collection_id",
    "collection_title",
    "type_id",
    "type_value",
    "variant_weights",
    "weight_price_map",
    "weight_thumbnail_map",
    "weight_for_min_price",
    "weight_for_max_price",
    "available_weights_text",
    "status",
    "variant_skus",
];

/// A product document as stored in the search index.
///
/// Prices are flattened to one currency. Multi-variant products carry a
/// weight to price map and a weight to thumbnail map keyed by grams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub id: Option<String>,
    #[serde(rename = "objectID")]
    pub object_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub handle: Option<String>,
    pub thumbnail: Option<String>,
    pub min_price: Option<Value>,
    pub max_price: Option<Value>,
    pub currency_code: Option<String>,
    pub category_ids: Vec<String>,
    pub category_names: Vec<String>,
    pub tag_values: Vec<String>,
    pub collection_id: Option<String>,
    pub collection_title: Option<String>,
    pub type_id: Option<String>,
    pub type_value: Option<String>,
    pub status: Option<String>,
    pub variant_skus: Vec<String>,
    pub variant_weights: Vec<Decimal>,
    pub weight_price_map: HashMap<String, Value>,
    pub weight_thumbnail_map: HashMap<String, Option<String>>,
    pub weight_for_min_price: Option<Decimal>,
    pub weight_for_max_price: Option<Decimal>,
    pub available_weights_text: Vec<String>,
}

impl SearchHit {
    /// Identifier of the indexed product.
    #[must_use]
    pub fn product_id(&self) -> &str {
        self.id
            .as_deref()
            .or(self.object_id.as_deref())
            .unwrap_or_default()
    }

    /// Lowest price across variants.
    #[must_use]
    pub fn min_price(&self) -> Option<Decimal> {
        self.min_price.as_ref().and_then(parse_search_price)
    }

    /// Highest price across variants.
    #[must_use]
    pub fn max_price(&self) -> Option<Decimal> {
        self.max_price.as_ref().and_then(parse_search_price)
    }

    /// Price of the variant with `weight`, if the index knows it.
    #[must_use]
    pub fn price_for_weight(&self, weight: Decimal) -> Option<Decimal> {
        self.weight_price_map
            .get(&weight_key(weight))
            .and_then(parse_search_price)
    }

    /// Thumbnail of the variant with `weight`, if any.
    #[must_use]
    pub fn thumbnail_for_weight(&self, weight: Decimal) -> Option<&str> {
        self.weight_thumbnail_map
            .get(&weight_key(weight))
            .and_then(Option::as_deref)
            .filter(|url| !url.is_empty())
    }

    /// Display label of the variant with `weight` (e.g. `"250 g"`).
    #[must_use]
    pub fn weight_label(&self, weight: Decimal) -> Option<&str> {
        let index = self.variant_weights.iter().position(|w| *w == weight)?;
        self.available_weights_text.get(index).map(String::as_str)
    }
}

/// Map key used by the index for a weight.
fn weight_key(weight: Decimal) -> String {
    weight.normalize().to_string()
}

/// Parse a price as stored in the index: a number or a loosely formatted string.
#[must_use]
pub fn parse_search_price(value: &Value) -> Option<Decimal> {
    parse_amount(value)
}

/// Raw search service response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
    #[serde(default)]
    pub estimated_total_hits: Option<u64>,
}
