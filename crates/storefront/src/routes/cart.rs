//! Cart route handlers.
//!
//! The cart lives in the browser session under [`CART_STORAGE_KEY`]. Every
//! mutation loads the full line-item list, applies one change, writes it back
//! and returns the new state. A session that holds an unreadable cart is
//! treated as empty; a failed write is logged and the new state is still
//! returned.

use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use mariquita_core::{ProductId, VariantId};

use crate::cart::{CART_STORAGE_KEY, Cart, CartLineItem, CartSummary};
use crate::error::{AppError, Result, add_breadcrumb};

/// Cart state returned by every cart endpoint.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineItem>,
    pub summary: CartSummary,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let summary = cart.summary();
        Self {
            items: cart.into_items(),
            summary,
        }
    }
}

/// Identifies one line.
#[derive(Debug, Deserialize)]
pub struct LineRef {
    pub product_id: ProductId,
    pub variant_id: VariantId,
}

/// Switch a line to another variant of the same product.
#[derive(Debug, Deserialize)]
pub struct ChangeVariant {
    pub product_id: ProductId,
    pub old_variant_id: VariantId,
    pub new_variant_id: VariantId,
}

/// Badge counts.
#[derive(Debug, Serialize)]
pub struct CartCount {
    /// Distinct line items.
    pub items: usize,
    /// Sum of quantities.
    pub quantity: u64,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the cart from the session.
async fn load_cart(session: &Session) -> Cart {
    match session.get::<Cart>(CART_STORAGE_KEY).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable session cart");
            Cart::new()
        }
    }
}

/// Save the cart to the session.
async fn save_cart(session: &Session, cart: &Cart) {
    if let Err(e) = session.insert(CART_STORAGE_KEY, cart).await {
        tracing::warn!(error = %e, "Failed to save cart to session");
    }
}

/// Apply one mutation and persist it.
async fn mutate(session: &Session, apply: impl FnOnce(&mut Cart)) -> Json<CartResponse> {
    let mut cart = load_cart(session).await;
    apply(&mut cart);
    save_cart(session, &cart).await;
    Json(cart.into())
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api/cart`
#[instrument(skip(session))]
pub async fn show(session: Session) -> Json<CartResponse> {
    Json(load_cart(&session).await.into())
}

/// `POST /api/cart/items`
///
/// Adds the item, or raises the quantity of the existing line for the same
/// product and variant.
#[instrument(skip(session, item), fields(product_id = %item.product_id, variant_id = %item.variant_id))]
pub async fn add(session: Session, Json(item): Json<CartLineItem>) -> Result<Json<CartResponse>> {
    if item.product_id.is_empty() || item.variant_id.is_empty() {
        return Err(AppError::BadRequest(
            "product_id and variant_id are required".to_string(),
        ));
    }
    if item.quantity == 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }
    if item.unit_price < Decimal::ZERO {
        return Err(AppError::BadRequest("unit_price must not be negative".to_string()));
    }

    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[
            ("product_id", item.product_id.as_str()),
            ("variant_id", item.variant_id.as_str()),
        ]),
    );
    Ok(mutate(&session, |cart| {
        cart.add_item(item);
    })
    .await)
}

/// `POST /api/cart/items/increase`
#[instrument(skip(session))]
pub async fn increase(session: Session, Json(line): Json<LineRef>) -> Json<CartResponse> {
    mutate(&session, |cart| {
        cart.increase_quantity(&line.product_id, &line.variant_id);
    })
    .await
}

/// `POST /api/cart/items/decrease`
///
/// Never drops a line below quantity 1; use remove for that.
#[instrument(skip(session))]
pub async fn decrease(session: Session, Json(line): Json<LineRef>) -> Json<CartResponse> {
    mutate(&session, |cart| {
        cart.decrease_quantity(&line.product_id, &line.variant_id);
    })
    .await
}

/// `POST /api/cart/items/remove`
#[instrument(skip(session))]
pub async fn remove(session: Session, Json(line): Json<LineRef>) -> Json<CartResponse> {
    mutate(&session, |cart| {
        cart.remove_item(&line.product_id, &line.variant_id);
    })
    .await
}

/// `POST /api/cart/items/variant`
#[instrument(skip(session))]
pub async fn change_variant(
    session: Session,
    Json(change): Json<ChangeVariant>,
) -> Json<CartResponse> {
    mutate(&session, |cart| {
        if !cart.update_item_variant(
            &change.product_id,
            &change.old_variant_id,
            &change.new_variant_id,
        ) {
            tracing::debug!("Variant change left the cart unchanged");
        }
    })
    .await
}

/// `POST /api/cart/clear`
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Json<CartResponse> {
    mutate(&session, Cart::clear).await
}

/// `GET /api/cart/count`
#[instrument(skip(session))]
pub async fn count(session: Session) -> Json<CartCount> {
    let summary = load_cart(&session).await.summary();
    Json(CartCount {
        items: summary.item_count,
        quantity: summary.quantity_total,
    })
}

/// `GET /api/checkout/summary`
#[instrument(skip(session))]
pub async fn checkout_summary(session: Session) -> Json<CartSummary> {
    Json(load_cart(&session).await.summary())
}
