//! Price resolution for commerce products.
//!
//! Amounts are major currency units. Anything that cannot be read as a price
//! resolves to zero so a bad record never breaks a listing.

use std::str::FromStr;

use mariquita_core::PriceRange;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::Value;

use super::types::{CalculatedPrice, StoreProduct, StoreVariant};

/// Price list type that makes a lower price count as a discount.
const SALE_PRICE_LIST: &str = "sale";

/// Parse a price from a JSON number or a loosely formatted string.
///
/// Strings may use a comma as decimal separator and carry currency symbols
/// or other stray characters; only the first dot is kept.
#[must_use]
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64))
        }
        Value::String(s) => parse_amount_str(s),
        _ => None,
    }
}

fn parse_amount_str(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut cleaned = String::with_capacity(trimmed.len());
    let mut seen_dot = false;
    for c in trimmed.chars() {
        match c {
            '0'..='9' | '-' => cleaned.push(c),
            '.' | ',' if !seen_dot => {
                seen_dot = true;
                cleaned.push('.');
            }
            _ => {}
        }
    }

    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Resolved display pricing for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductPricing {
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: Option<u32>,
    pub discount_label: Option<String>,
    pub includes_tax: bool,
    pub price_list_type: Option<String>,
}

impl ProductPricing {
    const fn plain(price: Decimal) -> Self {
        Self {
            price,
            original_price: None,
            discount_percentage: None,
            discount_label: None,
            includes_tax: false,
            price_list_type: None,
        }
    }
}

/// The amount a calculated price is sold at, most specific first.
#[must_use]
pub fn variant_amount(price: &CalculatedPrice) -> Option<Decimal> {
    price
        .calculated_amount_with_tax
        .or(price.calculated_amount)
        .or(price.original_amount_with_tax)
        .or(price.original_amount)
}

const fn amount_includes_tax(price: &CalculatedPrice) -> bool {
    price.calculated_amount_with_tax.is_some() || price.original_amount_with_tax.is_some()
}

/// Cheapest raw `prices[]` entry across variants.
fn cheapest_raw_price(variants: &[StoreVariant]) -> Option<Decimal> {
    variants
        .iter()
        .flat_map(|v| v.prices.iter())
        .filter_map(|p| p.amount)
        .min()
}

/// Resolve the price shown for a product: its cheapest calculated variant,
/// the cheapest raw price when nothing was calculated, or zero.
#[must_use]
pub fn resolve_product_pricing(product: &StoreProduct) -> ProductPricing {
    let featured = product
        .variants
        .iter()
        .filter_map(|v| v.calculated_price.as_ref())
        .filter_map(|p| variant_amount(p).map(|amount| (p, amount)))
        .min_by(|a, b| a.1.cmp(&b.1));

    let Some((price_set, price)) = featured else {
        return ProductPricing::plain(cheapest_raw_price(&product.variants).unwrap_or_default());
    };

    let includes_tax = amount_includes_tax(price_set);
    let original_amount = if includes_tax {
        price_set
            .original_amount_with_tax
            .or(price_set.original_amount)
    } else {
        price_set.original_amount
    };
    let price_list_type = price_set
        .calculated_price
        .as_ref()
        .and_then(|info| info.price_list_type.clone());

    let mut pricing = ProductPricing {
        includes_tax,
        price_list_type,
        ..ProductPricing::plain(price)
    };

    if pricing.price_list_type.as_deref() == Some(SALE_PRICE_LIST)
        && let Some(original) = original_amount
        && original > price
    {
        let percentage = ((original - price) / original * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        pricing.original_price = Some(original);
        pricing.discount_percentage = percentage.to_u32();
        pricing.discount_label = Some(format!("-{percentage}%"));
    }

    pricing
}

/// Bounds of the resolved prices of `products`, `{0, 0}` when empty.
#[must_use]
pub fn compute_price_range(products: &[StoreProduct]) -> PriceRange {
    PriceRange::covering(
        products
            .iter()
            .map(|p| resolve_product_pricing(p).price)
            .filter(|price| !price.is_sign_negative()),
    )
    .unwrap_or_default()
}

/// The cheapest variant that has both a calculated amount and a weight.
#[must_use]
pub fn extract_cheapest_variant(product: &StoreProduct) -> Option<&StoreVariant> {
    product
        .variants
        .iter()
        .filter(|v| v.weight.is_some_and(|w| !w.is_zero()))
        .filter_map(|v| {
            v.calculated_price
                .as_ref()
                .and_then(|p| p.calculated_amount)
                .map(|amount| (v, amount))
        })
        .min_by(|a, b| a.1.cmp(&b.1))
        .map(|(v, _)| v)
}

/// Weight of the cheapest variant, if any.
#[must_use]
pub fn extract_cheapest_weight(product: &StoreProduct) -> Option<Decimal> {
    extract_cheapest_variant(product).and_then(|v| v.weight)
}

/// Format a weight in grams, e.g. `250g`.
#[must_use]
pub fn format_weight(weight: Decimal) -> String {
    format!("{}g", weight.normalize())
}

/// Format a major-unit amount for display.
#[must_use]
pub fn format_price(amount: Decimal, currency_code: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    match currency_code.to_ascii_uppercase().as_str() {
        "USD" => format!("${rounded:.2}"),
        "EUR" => format!("{rounded:.2} €"),
        other => format!("{other} {rounded:.2}"),
    }
}
