//! Conversion of search hits into store products.
//!
//! A hit becomes a `StoreProduct` with one synthetic variant priced either
//! for the selected weight or at the hit's minimum price, so the regular
//! pricing code can render it.

use std::collections::BTreeSet;

use mariquita_core::{
    CategoryId, CollectionId, PriceRange, ProductId, ProductStatus, ProductTypeId, VariantId,
};
use rust_decimal::Decimal;

use super::SearchHit;
use crate::commerce::format_weight;
use crate::commerce::types::{
    CalculatedPrice, MoneyAmount, ProductCategory, ProductCollection, ProductTag, ProductType,
    StoreProduct, StoreVariant,
};

/// Range reported when no product carries a price.
const DEFAULT_SEARCH_PRICE_RANGE: (i64, i64) = (0, 100);

/// What a hit shows for the current weight selection.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DisplayData {
    price: Option<Decimal>,
    weight: Option<Decimal>,
    weight_text: Option<String>,
    thumbnail: Option<String>,
}

fn select_display_data(hit: &SearchHit, selected_weight: Option<Decimal>) -> DisplayData {
    if let Some(weight) = selected_weight.filter(|w| !w.is_zero())
        && let Some(price) = hit.price_for_weight(weight)
    {
        return DisplayData {
            price: Some(price),
            weight: Some(weight),
            weight_text: Some(
                hit.weight_label(weight)
                    .map_or_else(|| format_weight(weight), String::from),
            ),
            thumbnail: hit
                .thumbnail_for_weight(weight)
                .or(hit.thumbnail.as_deref())
                .map(String::from),
        };
    }

    let weight = hit.weight_for_min_price.filter(|w| !w.is_zero());
    DisplayData {
        price: hit.min_price(),
        weight,
        weight_text: weight.map(|w| {
            hit.weight_label(w)
                .map_or_else(|| format_weight(w), String::from)
        }),
        thumbnail: weight
            .and_then(|w| hit.thumbnail_for_weight(w))
            .or(hit.thumbnail.as_deref())
            .map(String::from),
    }
}

fn synthetic_variant(hit: &SearchHit, display: &DisplayData) -> Option<StoreVariant> {
    let price = display.price?;
    let original = hit.max_price().filter(|max| *max > price).unwrap_or(price);

    Some(StoreVariant {
        id: VariantId::new(format!("{}-variant-1", hit.product_id())),
        title: Some(
            display
                .weight_text
                .clone()
                .unwrap_or_else(|| "Default".to_string()),
        ),
        sku: hit.variant_skus.first().cloned(),
        weight: display.weight,
        calculated_price: Some(CalculatedPrice {
            calculated_amount: Some(price),
            original_amount: Some(original),
            ..CalculatedPrice::default()
        }),
        prices: vec![MoneyAmount {
            amount: Some(price),
            currency_code: Some(
                hit.currency_code
                    .clone()
                    .unwrap_or_else(|| "USD".to_string()),
            ),
        }],
    })
}

/// Convert a hit into a product, pricing it for `selected_weight` when the
/// hit has that weight.
#[must_use]
pub fn hit_to_product(hit: &SearchHit, selected_weight: Option<Decimal>) -> StoreProduct {
    let display = select_display_data(hit, selected_weight);
    let variant = synthetic_variant(hit, &display);

    StoreProduct {
        id: ProductId::new(hit.product_id()),
        title: hit.title.clone(),
        handle: hit.handle.clone(),
        description: hit.description.clone(),
        thumbnail: display.thumbnail,
        status: Some(
            hit.status
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(ProductStatus::Published),
        ),
        variants: variant.into_iter().collect(),
        categories: hit
            .category_ids
            .iter()
            .enumerate()
            .map(|(i, id)| ProductCategory {
                id: CategoryId::new(id.as_str()),
                name: hit.category_names.get(i).cloned(),
            })
            .collect(),
        collection: hit.collection_id.as_ref().map(|id| ProductCollection {
            id: CollectionId::new(id.as_str()),
            title: hit.collection_title.clone(),
        }),
        product_type: hit.type_id.as_ref().map(|id| ProductType {
            id: ProductTypeId::new(id.as_str()),
            value: hit.type_value.clone(),
        }),
        tags: hit
            .tag_values
            .iter()
            .map(|value| ProductTag {
                id: None,
                value: value.clone(),
            })
            .collect(),
        images: Vec::new(),
    }
}

/// Price range of converted products: min floored, max ceiled, `{0, 100}`
/// when no product has a price.
#[must_use]
pub fn compute_search_price_range(products: &[StoreProduct]) -> PriceRange {
    let prices = products
        .iter()
        .filter_map(|p| p.variants.first())
        .filter_map(|v| v.calculated_price.as_ref()?.calculated_amount)
        .filter(|price| !price.is_sign_negative());

    PriceRange::covering(prices).map_or_else(
        || {
            let (min, max) = DEFAULT_SEARCH_PRICE_RANGE;
            PriceRange::new(Decimal::from(min), Decimal::from(max))
        },
        |range| {
            PriceRange::new(
                range.min.floor().max(Decimal::ZERO),
                range.max.ceil().max(Decimal::ONE),
            )
        },
    )
}

/// Distinct, trimmed, sorted weight labels across hits.
#[must_use]
pub fn collect_weight_labels(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .flat_map(|hit| hit.available_weights_text.iter())
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
