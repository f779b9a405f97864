//! One display shape for products from either backend.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::commerce::types::PLACEHOLDER_PRODUCT_IMAGE;
use crate::commerce::{
    StoreProduct, extract_cheapest_variant, format_price, format_weight, resolve_product_pricing,
};
use crate::search::SearchHit;

const FALLBACK_NAME: &str = "Product";
const FALLBACK_HIGHLIGHT: &str = "Mariquita Selection";
const UNKNOWN_ID: &str = "unknown";

/// Price block of a product card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPricing {
    pub price_text: String,
    pub original_price_text: Option<String>,
    pub includes_tax: bool,
    pub discount_label: Option<String>,
}

/// Fields every product card renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Collection title, else product type, else a house label.
    pub highlight_label: String,
    pub weight_text: Option<String>,
    pub pricing: CardPricing,
    /// Cheapest weighted variant, preselected when adding to the cart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_variant_id: Option<String>,
}

/// A product card together with the record it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ProductCard {
    Store {
        #[serde(flatten)]
        view: CardView,
        product: Box<StoreProduct>,
    },
    Search {
        #[serde(flatten)]
        view: CardView,
        hit: Box<SearchHit>,
    },
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

impl ProductCard {
    /// Card for a commerce backend product.
    #[must_use]
    pub fn from_store(product: StoreProduct, currency_code: &str) -> Self {
        let id = non_empty(Some(product.id.as_str()))
            .or_else(|| non_empty(product.handle.as_deref()))
            .or_else(|| non_empty(product.title.as_deref()))
            .unwrap_or(UNKNOWN_ID)
            .to_string();
        let name = non_empty(product.title.as_deref())
            .unwrap_or(FALLBACK_NAME)
            .to_string();
        let highlight_label = non_empty(product.collection.as_ref().and_then(|c| c.title.as_deref()))
            .or_else(|| non_empty(product.product_type.as_ref().and_then(|t| t.value.as_deref())))
            .unwrap_or(FALLBACK_HIGHLIGHT)
            .to_string();

        let cheapest = extract_cheapest_variant(&product);
        let weight_text = cheapest.and_then(|v| v.weight).map(format_weight);
        let default_variant_id = cheapest.map(|v| v.id.to_string());

        let pricing = resolve_product_pricing(&product);
        let pricing = CardPricing {
            price_text: format_price(pricing.price, currency_code),
            original_price_text: pricing
                .original_price
                .map(|amount| format_price(amount, currency_code)),
            includes_tax: pricing.includes_tax,
            discount_label: pricing.discount_label,
        };

        Self::Store {
            view: CardView {
                id,
                name,
                image: product.display_thumbnail().to_string(),
                highlight_label,
                weight_text,
                pricing,
                default_variant_id,
            },
            product: Box::new(product),
        }
    }

    /// Card for a search index hit.
    ///
    /// Shows the minimum price; the maximum is shown struck through when it
    /// is higher. Index prices never carry tax or sale information.
    #[must_use]
    pub fn from_search(hit: SearchHit, currency_code: &str) -> Self {
        let id = non_empty(hit.object_id.as_deref())
            .or_else(|| non_empty(hit.id.as_deref()))
            .or_else(|| non_empty(hit.title.as_deref()))
            .unwrap_or(UNKNOWN_ID)
            .to_string();
        let name = non_empty(hit.title.as_deref())
            .or_else(|| non_empty(hit.description.as_deref()))
            .unwrap_or(FALLBACK_NAME)
            .to_string();
        let highlight_label = non_empty(hit.collection_title.as_deref())
            .or_else(|| non_empty(hit.type_value.as_deref()))
            .unwrap_or(FALLBACK_HIGHLIGHT)
            .to_string();
        let image = non_empty(hit.thumbnail.as_deref())
            .unwrap_or(PLACEHOLDER_PRODUCT_IMAGE)
            .to_string();

        let currency = non_empty(hit.currency_code.as_deref()).unwrap_or(currency_code);
        let min = hit.min_price();
        let max = hit.max_price();
        let price = min.or(max).unwrap_or(Decimal::ZERO);
        let original = max.filter(|max| *max > price);

        let view = CardView {
            id,
            name,
            image,
            highlight_label,
            weight_text: hit
                .weight_for_min_price
                .filter(|w| !w.is_zero())
                .map(format_weight),
            pricing: CardPricing {
                price_text: format_price(price, currency),
                original_price_text: original.map(|amount| format_price(amount, currency)),
                includes_tax: false,
                discount_label: None,
            },
            default_variant_id: None,
        };

        Self::Search {
            view,
            hit: Box::new(hit),
        }
    }

    /// The normalized display fields.
    #[must_use]
    pub const fn view(&self) -> &CardView {
        match self {
            Self::Store { view, .. } | Self::Search { view, .. } => view,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store_product(value: serde_json::Value) -> StoreProduct {
        serde_json::from_value(value).unwrap()
    }

    fn hit(value: serde_json::Value) -> SearchHit {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_store_card() {
        let product = store_product(json!({
            "id": "prod_1",
            "title": "Arabica",
            "thumbnail": "https://cdn.example.test/a.jpg",
            "collection": { "id": "col_1", "title": "Coffee" },
            "variants": [
                {
                    "id": "v_500",
                    "weight": 500,
                    "calculated_price": { "calculated_amount": 18, "original_amount": 18 }
                },
                {
                    "id": "v_250",
                    "weight": 250,
                    "calculated_price": {
                        "calculated_amount": 8,
                        "original_amount": 10,
                        "calculated_price": { "price_list_type": "sale" }
                    }
                }
            ]
        }));

        let card = ProductCard::from_store(product, "USD");
        let view = card.view();
        assert_eq!(view.id, "prod_1");
        assert_eq!(view.name, "Arabica");
        assert_eq!(view.image, "https://cdn.example.test/a.jpg");
        assert_eq!(view.highlight_label, "Coffee");
        assert_eq!(view.weight_text.as_deref(), Some("250g"));
        assert_eq!(view.default_variant_id.as_deref(), Some("v_250"));
        assert_eq!(view.pricing.price_text, "$8.00");
        assert_eq!(view.pricing.original_price_text.as_deref(), Some("$10.00"));
        assert_eq!(view.pricing.discount_label.as_deref(), Some("-20%"));
    }

    #[test]
    fn test_store_card_fallbacks() {
        let product = store_product(json!({
            "id": "prod_2",
            "type": { "id": "ptyp_1", "value": "Tea" }
        }));

        let card = ProductCard::from_store(product, "EUR");
        let view = card.view();
        assert_eq!(view.name, FALLBACK_NAME);
        assert_eq!(view.image, PLACEHOLDER_PRODUCT_IMAGE);
        assert_eq!(view.highlight_label, "Tea");
        assert_eq!(view.weight_text, None);
        assert_eq!(view.default_variant_id, None);
        assert_eq!(view.pricing.price_text, "0.00 €");
    }

    #[test]
    fn test_search_card() {
        let card = ProductCard::from_search(
            hit(json!({
                "objectID": "prod_3",
                "id": "other",
                "description": "Green tea",
                "min_price": "4,50",
                "max_price": 9,
                "weight_for_min_price": 100
            })),
            "USD",
        );

        let view = card.view();
        assert_eq!(view.id, "prod_3");
        assert_eq!(view.name, "Green tea");
        assert_eq!(view.highlight_label, FALLBACK_HIGHLIGHT);
        assert_eq!(view.image, PLACEHOLDER_PRODUCT_IMAGE);
        assert_eq!(view.weight_text.as_deref(), Some("100g"));
        assert_eq!(view.pricing.price_text, "$4.50");
        assert_eq!(view.pricing.original_price_text.as_deref(), Some("$9.00"));
        assert!(!view.pricing.includes_tax);
    }

    #[test]
    fn test_search_card_uses_max_when_min_missing() {
        let card = ProductCard::from_search(hit(json!({ "max_price": "abc" })), "USD");
        let view = card.view();
        assert_eq!(view.id, UNKNOWN_ID);
        assert_eq!(view.pricing.price_text, "$0.00");
        assert_eq!(view.pricing.original_price_text, None);
    }

    #[test]
    fn test_card_json_is_tagged() {
        let card = ProductCard::from_store(store_product(json!({ "id": "prod_1" })), "USD");
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["source"], "store");
        assert_eq!(value["id"], "prod_1");
        assert!(value["pricing"]["priceText"].is_string());
        assert_eq!(value["product"]["id"], "prod_1");

        let card = ProductCard::from_search(hit(json!({ "id": "prod_4" })), "USD");
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["source"], "search");
        assert_eq!(value["hit"]["id"], "prod_4");
    }
}
