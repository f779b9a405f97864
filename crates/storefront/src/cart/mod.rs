//! Shopping cart state.
//!
//! The cart is an ordered list of line items, unique per
//! `(product_id, variant_id)`. [`Cart`] is the pure state value with every
//! mutator; [`CartStore`] wraps it as an observable, persisted store.
//!
//! All mutators are total: unknown or empty identifiers simply never match.

mod storage;
mod store;

use std::collections::HashMap;

use mariquita_core::{ProductId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use storage::{CART_STORAGE_KEY, CartStorage, CartStorageError, JsonFileStorage, MemoryStorage};
pub use store::{CartSnapshot, CartStore};

/// Separator used in [`cart_item_key`].
pub const CART_KEY_SEPARATOR: &str = "::";

/// Flat delivery fee charged below the free shipping threshold.
pub const BASE_DELIVERY_FEE: Decimal = Decimal::from_parts(250, 0, 0, false, 2);

/// Subtotal from which delivery is free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Alternative variant of the same product, captured when the item is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartVariantOption {
    pub id: VariantId,
    pub weight_label: String,
    pub price: Decimal,
}

/// A single cart line.
///
/// Display fields are a snapshot taken at add time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub title: String,
    pub thumbnail: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<CartVariantOption>,
}

impl CartLineItem {
    /// Create a line item with only the required fields.
    #[must_use]
    pub fn new(
        product_id: impl Into<ProductId>,
        variant_id: impl Into<VariantId>,
        title: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: variant_id.into(),
            title: title.into(),
            thumbnail: None,
            quantity,
            unit_price,
            original_price: None,
            discount_label: None,
            categories_text: None,
            weight_label: None,
            variants: Vec::new(),
        }
    }

    /// Attach the alternative variants offered for this product.
    #[must_use]
    pub fn with_variants(mut self, variants: Vec<CartVariantOption>) -> Self {
        self.variants = variants;
        self
    }

    /// Attach a thumbnail URL.
    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    fn matches(&self, product_id: &ProductId, variant_id: &VariantId) -> bool {
        self.product_id == *product_id && self.variant_id == *variant_id
    }

    /// Line total (`unit_price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Key used by [`Cart::item_map`]: `"{product}::{variant}"`.
#[must_use]
pub fn cart_item_key(product_id: &ProductId, variant_id: &VariantId) -> String {
    format!("{product_id}{CART_KEY_SEPARATOR}{variant_id}")
}

/// Aggregates derived from the line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    /// Sum of `unit_price * quantity`.
    pub subtotal: Decimal,
    /// Number of distinct line items.
    pub item_count: usize,
    /// Sum of quantities.
    pub quantity_total: u64,
    /// Zero at or above [`FREE_SHIPPING_THRESHOLD`], else [`BASE_DELIVERY_FEE`].
    pub delivery_fee: Decimal,
    /// `subtotal + delivery_fee`.
    pub total: Decimal,
}

impl CartSummary {
    /// Compute the aggregates for a list of line items.
    #[must_use]
    pub fn from_items(items: &[CartLineItem]) -> Self {
        let subtotal: Decimal = items.iter().map(CartLineItem::line_total).sum();
        let quantity_total = items.iter().map(|item| u64::from(item.quantity)).sum();
        let delivery_fee = delivery_fee_for(subtotal);

        Self {
            subtotal,
            item_count: items.len(),
            quantity_total,
            delivery_fee,
            total: subtotal + delivery_fee,
        }
    }
}

/// Delivery fee for a given subtotal.
#[must_use]
pub fn delivery_fee_for(subtotal: Decimal) -> Decimal {
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        BASE_DELIVERY_FEE
    }
}

/// The cart's line items, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Wrap an existing list of line items.
    #[must_use]
    pub const fn from_items(items: Vec<CartLineItem>) -> Self {
        Self { items }
    }

    /// Line items in display order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Consume the cart, returning its line items.
    #[must_use]
    pub fn into_items(self) -> Vec<CartLineItem> {
        self.items
    }

    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line item.
    #[must_use]
    pub fn get(&self, product_id: &ProductId, variant_id: &VariantId) -> Option<&CartLineItem> {
        self.items
            .iter()
            .find(|item| item.matches(product_id, variant_id))
    }

    fn get_mut(&mut self, product_id: &ProductId, variant_id: &VariantId) -> Option<&mut CartLineItem> {
        self.items
            .iter_mut()
            .find(|item| item.matches(product_id, variant_id))
    }

    /// Add an item, merging into an existing line with the same identity.
    ///
    /// A merge only adds the quantity; the existing line's snapshot is kept.
    /// Items with a zero quantity or a negative price are ignored. Returns
    /// whether the cart changed.
    pub fn add_item(&mut self, item: CartLineItem) -> bool {
        if item.quantity == 0 || item.unit_price < Decimal::ZERO {
            return false;
        }
        if let Some(existing) = self.get_mut(&item.product_id, &item.variant_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            return true;
        }
        self.items.push(item);
        true
    }

    /// Remove the matching line item, if any.
    pub fn remove_item(&mut self, product_id: &ProductId, variant_id: &VariantId) {
        self.items.retain(|item| !item.matches(product_id, variant_id));
    }

    /// Increase the matching line's quantity by one.
    pub fn increase_quantity(&mut self, product_id: &ProductId, variant_id: &VariantId) {
        if let Some(item) = self.get_mut(product_id, variant_id) {
            item.quantity = item.quantity.saturating_add(1);
        }
    }

    /// Decrease the matching line's quantity by one, never below one.
    pub fn decrease_quantity(&mut self, product_id: &ProductId, variant_id: &VariantId) {
        if let Some(item) = self.get_mut(product_id, variant_id)
            && item.quantity > 1
        {
            item.quantity -= 1;
        }
    }

    /// Switch a line item to another variant of the same product.
    ///
    /// The target variant must be listed in the source line's `variants`.
    /// If a line for the target already exists the quantities are merged into
    /// it and the source line is dropped; otherwise the source line is
    /// relabelled in place. Returns whether the cart changed.
    pub fn update_item_variant(
        &mut self,
        product_id: &ProductId,
        old_variant_id: &VariantId,
        new_variant_id: &VariantId,
    ) -> bool {
        if old_variant_id == new_variant_id {
            return false;
        }

        let Some(source_index) = self
            .items
            .iter()
            .position(|item| item.matches(product_id, old_variant_id))
        else {
            return false;
        };

        let Some(target_option) = self
            .items
            .get(source_index)
            .and_then(|source| source.variants.iter().find(|v| v.id == *new_variant_id))
            .cloned()
        else {
            return false;
        };

        if let Some(target_index) = self
            .items
            .iter()
            .position(|item| item.matches(product_id, new_variant_id))
        {
            let source = self.items.remove(source_index);
            let target_index = if target_index > source_index {
                target_index - 1
            } else {
                target_index
            };
            if let Some(target) = self.items.get_mut(target_index) {
                target.quantity = target.quantity.saturating_add(source.quantity);
            }
            return true;
        }

        if let Some(source) = self.items.get_mut(source_index) {
            source.variant_id = target_option.id;
            source.unit_price = target_option.price;
            source.weight_label = Some(target_option.weight_label);
        }
        true
    }

    /// Remove every line item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Line items keyed by [`cart_item_key`].
    #[must_use]
    pub fn item_map(&self) -> HashMap<String, &CartLineItem> {
        self.items
            .iter()
            .map(|item| (cart_item_key(&item.product_id, &item.variant_id), item))
            .collect()
    }

    /// Derived aggregates.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary::from_items(&self.items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(product: &str, variant: &str, quantity: u32, price: i64) -> CartLineItem {
        CartLineItem::new(product, variant, "Kiwi deshidratado", quantity, Decimal::from(price))
    }

    fn ids(product: &str, variant: &str) -> (ProductId, VariantId) {
        (ProductId::new(product), VariantId::new(variant))
    }

    fn option(variant: &str, label: &str, price: i64) -> CartVariantOption {
        CartVariantOption {
            id: VariantId::new(variant),
            weight_label: label.to_string(),
            price: Decimal::from(price),
        }
    }

    #[test]
    fn test_add_same_identity_merges() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", "v1", 1, 10));
        cart.add_item(item("p1", "v1", 1, 10));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn test_add_rejects_zero_quantity_and_negative_price() {
        let mut cart = Cart::new();

        assert!(!cart.add_item(item("p1", "v1", 0, 10)));
        assert!(!cart.add_item(item("p2", "v1", 1, -10)));
        assert!(cart.is_empty());

        // A rejected add leaves an existing line untouched.
        assert!(cart.add_item(item("p1", "v1", 2, 10)));
        assert!(!cart.add_item(item("p1", "v1", 0, 10)));
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.summary().subtotal, Decimal::from(20));
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut cart = Cart::new();
        cart.add_item(item("p2", "v1", 1, 10));
        cart.add_item(item("p1", "v1", 1, 10));
        cart.add_item(item("p2", "v1", 1, 10));

        let order: Vec<&str> = cart.items().iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(order, vec!["p2", "p1"]);
    }

    #[test]
    fn test_merge_keeps_existing_snapshot() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", "v1", 1, 10).with_thumbnail("a.webp"));
        let mut later = item("p1", "v1", 2, 99).with_thumbnail("b.webp");
        later.title = "Renamed".to_string();
        cart.add_item(later);

        let line = &cart.items()[0];
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, Decimal::from(10));
        assert_eq!(line.thumbnail.as_deref(), Some("a.webp"));
        assert_eq!(line.title, "Kiwi deshidratado");
    }

    #[test]
    fn test_remove_item() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", "v1", 1, 10));
        cart.add_item(item("p1", "v2", 1, 10));
        let (p, v) = ids("p1", "v1");
        cart.remove_item(&p, &v);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].variant_id.as_str(), "v2");

        // Absent item is a no-op
        cart.remove_item(&p, &v);
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_increase_and_decrease_quantity() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", "v1", 1, 10));
        let (p, v) = ids("p1", "v1");

        cart.increase_quantity(&p, &v);
        assert_eq!(cart.items()[0].quantity, 2);
        cart.decrease_quantity(&p, &v);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_decrease_floors_at_one() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", "v1", 1, 10));
        let (p, v) = ids("p1", "v1");

        cart.decrease_quantity(&p, &v);
        cart.decrease_quantity(&p, &v);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_empty_ids_never_match() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", "v1", 1, 10));
        let (p, v) = ids("", "");

        cart.increase_quantity(&p, &v);
        cart.remove_item(&p, &v);
        assert_eq!(cart.items()[0].quantity, 1);
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_variant_switch_merges_into_existing() {
        let variants = vec![option("v1", "250g", 10), option("v2", "500g", 18)];
        let mut cart = Cart::from_items(vec![
            item("p1", "v1", 2, 10).with_variants(variants.clone()),
            item("p1", "v2", 1, 18).with_thumbnail("target.webp"),
        ]);
        let (p, v1) = ids("p1", "v1");
        let v2 = VariantId::new("v2");

        assert!(cart.update_item_variant(&p, &v1, &v2));

        assert_eq!(cart.items().len(), 1);
        let line = &cart.items()[0];
        assert_eq!(line.variant_id, v2);
        assert_eq!(line.quantity, 3);
        assert_eq!(line.thumbnail.as_deref(), Some("target.webp"));
    }

    #[test]
    fn test_variant_switch_merges_when_target_precedes_source() {
        let variants = vec![option("v1", "250g", 10), option("v2", "500g", 18)];
        let mut cart = Cart::from_items(vec![
            item("p1", "v2", 1, 18),
            item("p9", "v1", 1, 5),
            item("p1", "v1", 4, 10).with_variants(variants),
        ]);
        let (p, v1) = ids("p1", "v1");

        assert!(cart.update_item_variant(&p, &v1, &VariantId::new("v2")));
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].quantity, 5);
        assert_eq!(cart.items()[1].product_id.as_str(), "p9");
    }

    #[test]
    fn test_variant_switch_relabels_in_place() {
        let variants = vec![option("v1", "250g", 10), option("v2", "500g", 18)];
        let mut cart = Cart::from_items(vec![item("p1", "v1", 2, 10).with_variants(variants)]);
        let (p, v1) = ids("p1", "v1");

        assert!(cart.update_item_variant(&p, &v1, &VariantId::new("v2")));

        let line = &cart.items()[0];
        assert_eq!(line.variant_id.as_str(), "v2");
        assert_eq!(line.unit_price, Decimal::from(18));
        assert_eq!(line.weight_label.as_deref(), Some("500g"));
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_variant_switch_noops() {
        let variants = vec![option("v1", "250g", 10)];
        let original = Cart::from_items(vec![item("p1", "v1", 2, 10).with_variants(variants)]);
        let (p, v1) = ids("p1", "v1");

        let mut cart = original.clone();
        assert!(!cart.update_item_variant(&p, &v1, &v1));
        assert!(!cart.update_item_variant(&p, &v1, &VariantId::new("unknown")));
        assert!(!cart.update_item_variant(&p, &VariantId::new("missing"), &v1));
        assert_eq!(cart, original);
    }

    #[test]
    fn test_summary_end_to_end() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", "v1", 1, 10));
        let summary = cart.summary();
        assert_eq!(summary.subtotal, Decimal::from(10));
        assert_eq!(summary.item_count, 1);

        cart.add_item(item("p1", "v1", 2, 10));
        let summary = cart.summary();
        assert_eq!(summary.subtotal, Decimal::from(30));
        assert_eq!(summary.item_count, 1);
        assert_eq!(summary.quantity_total, 3);
        assert_eq!(summary.delivery_fee, BASE_DELIVERY_FEE);
        assert_eq!(summary.total, Decimal::new(3250, 2));
    }

    #[test]
    fn test_free_shipping_threshold() {
        assert_eq!(delivery_fee_for(Decimal::from(49)), BASE_DELIVERY_FEE);
        assert_eq!(delivery_fee_for(Decimal::from(50)), Decimal::ZERO);
        assert_eq!(BASE_DELIVERY_FEE, Decimal::new(250, 2));
    }

    #[test]
    fn test_item_map_keys() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", "v1", 1, 10));
        let map = cart.item_map();
        assert!(map.contains_key("p1::v1"));
    }

    #[test]
    fn test_persisted_shape_omits_absent_fields() {
        let json = serde_json::to_value(Cart::from_items(vec![item("p1", "v1", 1, 10)])).unwrap();
        let line = &json[0];
        assert_eq!(line["product_id"], "p1");
        assert!(line.get("variants").is_none());
        assert!(line.get("discount_label").is_none());
    }
}
