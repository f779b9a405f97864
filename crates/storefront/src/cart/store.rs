//! Observable, persisted cart store.
//!
//! One `tokio::sync::watch` channel owns the current [`CartSnapshot`]. Each
//! mutation is applied to the full line-item list in a single
//! read-modify-write, the derived summary is recomputed, the list is written
//! to storage, and subscribers are notified.

use std::sync::Arc;

use mariquita_core::{ProductId, VariantId};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{Cart, CartLineItem, CartStorage, CartSummary};

/// Immutable view of the cart handed to readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub cart: Cart,
    pub summary: CartSummary,
}

impl CartSnapshot {
    fn new(cart: Cart) -> Self {
        let summary = cart.summary();
        Self { cart, summary }
    }

    /// Line items in display order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        self.cart.items()
    }
}

/// Single source of truth for the cart.
pub struct CartStore<S> {
    storage: S,
    state: watch::Sender<Arc<CartSnapshot>>,
}

impl<S: CartStorage> CartStore<S> {
    /// Open the store, reading any previously saved cart.
    ///
    /// Unreadable storage is logged and treated as an empty cart.
    pub fn open(storage: S) -> Self {
        let items = match storage.load() {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable stored cart");
                Vec::new()
            }
        };
        debug!(items = items.len(), "Cart store opened");

        let (state, _) = watch::channel(Arc::new(CartSnapshot::new(Cart::from_items(items))));
        Self { storage, state }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CartSnapshot> {
        self.state.borrow().clone()
    }

    /// Derived aggregates of the current snapshot.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        self.state.borrow().summary
    }

    /// Receive every future snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<CartSnapshot>> {
        self.state.subscribe()
    }

    /// Access the storage backend.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Apply one mutation; persists and notifies only if the cart changed.
    fn update(&self, mutate: impl FnOnce(&mut Cart)) {
        let mut saved: Option<Vec<CartLineItem>> = None;

        self.state.send_if_modified(|snapshot| {
            let mut cart = snapshot.cart.clone();
            mutate(&mut cart);
            if cart == snapshot.cart {
                return false;
            }
            saved = Some(cart.items().to_vec());
            *snapshot = Arc::new(CartSnapshot::new(cart));
            true
        });

        if let Some(items) = saved
            && let Err(e) = self.storage.save(&items)
        {
            warn!(error = %e, "Failed to persist cart");
        }
    }

    /// Add an item, merging with an existing line of the same identity.
    pub fn add_item(&self, item: CartLineItem) {
        self.update(|cart| {
            cart.add_item(item);
        });
    }

    /// Remove a line item.
    pub fn remove_item(&self, product_id: &ProductId, variant_id: &VariantId) {
        self.update(|cart| cart.remove_item(product_id, variant_id));
    }

    /// Increase a line's quantity by one.
    pub fn increase_quantity(&self, product_id: &ProductId, variant_id: &VariantId) {
        self.update(|cart| cart.increase_quantity(product_id, variant_id));
    }

    /// Decrease a line's quantity by one, never below one.
    pub fn decrease_quantity(&self, product_id: &ProductId, variant_id: &VariantId) {
        self.update(|cart| cart.decrease_quantity(product_id, variant_id));
    }

    /// Switch a line to another variant of the same product.
    pub fn update_item_variant(
        &self,
        product_id: &ProductId,
        old_variant_id: &VariantId,
        new_variant_id: &VariantId,
    ) {
        self.update(|cart| {
            cart.update_item_variant(product_id, old_variant_id, new_variant_id);
        });
    }

    /// Empty the cart.
    pub fn clear_cart(&self) {
        self.update(Cart::clear);
    }
}
