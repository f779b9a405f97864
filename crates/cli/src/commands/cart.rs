//! Cart file management.
//!
//! Drives a cart store over a `cart.json` file, the same document the
//! storefront keeps per session.
//!
//! # Usage
//!
//! ```bash
//! mq-cli cart --file ./carts/alice add --product p1 --variant v1 --title "Kiwi" --price 10
//! mq-cli cart --file ./carts/alice increase --product p1 --variant v1
//! mq-cli cart --file ./carts/alice show
//! ```

use std::path::Path;

use clap::Subcommand;
use rust_decimal::Decimal;
use serde::Serialize;

use mariquita_core::{ProductId, VariantId};
use mariquita_storefront::cart::{
    CartLineItem, CartSnapshot, CartStorage, CartStore, CartSummary, JsonFileStorage,
};

/// One cart operation.
#[derive(Debug, Clone, Subcommand)]
pub enum CartAction {
    /// Print items and totals
    Show,
    /// Add an item (merges with an existing line)
    Add {
        #[arg(long)]
        product: String,
        #[arg(long)]
        variant: String,
        #[arg(long)]
        title: String,
        /// Unit price in major units
        #[arg(long, value_parser = parse_price)]
        price: Decimal,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,
        #[arg(long)]
        thumbnail: Option<String>,
        /// Display label of the variant, e.g. "250 g"
        #[arg(long)]
        weight_label: Option<String>,
    },
    /// Increase a line's quantity by one
    Increase {
        #[arg(long)]
        product: String,
        #[arg(long)]
        variant: String,
    },
    /// Decrease a line's quantity by one (never below one)
    Decrease {
        #[arg(long)]
        product: String,
        #[arg(long)]
        variant: String,
    },
    /// Remove a line
    Remove {
        #[arg(long)]
        product: String,
        #[arg(long)]
        variant: String,
    },
    /// Switch a line to another variant listed on it
    Variant {
        #[arg(long)]
        product: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Remove every line
    Clear,
}

/// Parse a unit price, rejecting negative amounts.
fn parse_price(raw: &str) -> Result<Decimal, String> {
    let price: Decimal = raw.parse().map_err(|e| format!("invalid price: {e}"))?;
    if price < Decimal::ZERO {
        return Err("price must not be negative".to_string());
    }
    Ok(price)
}

/// What the command prints.
#[derive(Debug, Serialize)]
pub struct CartReport<'a> {
    pub items: &'a [CartLineItem],
    pub summary: CartSummary,
}

/// Apply `action` to a cart store.
pub fn apply<S: CartStorage>(store: &CartStore<S>, action: CartAction) {
    match action {
        CartAction::Show => {}
        CartAction::Add {
            product,
            variant,
            title,
            price,
            quantity,
            thumbnail,
            weight_label,
        } => {
            let mut item = CartLineItem::new(product, variant, title, quantity, price);
            item.thumbnail = thumbnail;
            item.weight_label = weight_label;
            store.add_item(item);
        }
        CartAction::Increase { product, variant } => {
            store.increase_quantity(&ProductId::new(product), &VariantId::new(variant));
        }
        CartAction::Decrease { product, variant } => {
            store.decrease_quantity(&ProductId::new(product), &VariantId::new(variant));
        }
        CartAction::Remove { product, variant } => {
            store.remove_item(&ProductId::new(product), &VariantId::new(variant));
        }
        CartAction::Variant { product, from, to } => {
            store.update_item_variant(
                &ProductId::new(product),
                &VariantId::new(from),
                &VariantId::new(to),
            );
        }
        CartAction::Clear => store.clear_cart(),
    }
}

/// Run the `cart` command against the cart file in `dir`.
///
/// # Errors
///
/// Returns an error if the result cannot be serialized.
pub fn run(dir: &Path, action: CartAction) -> Result<(), serde_json::Error> {
    let store = CartStore::open(JsonFileStorage::new(dir));
    tracing::debug!(path = %store.storage().path().display(), "Cart file opened");

    apply(&store, action);

    let snapshot: std::sync::Arc<CartSnapshot> = store.snapshot();
    super::print_json(&CartReport {
        items: snapshot.items(),
        summary: snapshot.summary,
    })
}
