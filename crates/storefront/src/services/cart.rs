//! The live cart and its persistence.
//!
//! `CartService` owns the in-memory cart. Every mutation updates the cart,
//! writes the full snapshot through the store and leaves a breadcrumb.
//! Mutations take `&mut self`, so there is a single writer by construction.

use tracing::{debug, warn};

use atelier_core::{AddOutcome, Cart, LineKey, Price, Product, ProductId};

use crate::error::add_breadcrumb;
use crate::store::{CartStore, KeyValueStore};

/// The cart state machine.
#[derive(Debug)]
pub struct CartService<S> {
    cart: Cart,
    store: CartStore<S>,
    revision: u64,
}

impl<S: KeyValueStore> CartService<S> {
    /// Hydrate the cart from the store.
    #[must_use]
    pub fn load(store: CartStore<S>) -> Self {
        let cart = store.load();
        debug!(lines = cart.len(), items = cart.total_items(), "Cart loaded");
        Self {
            cart,
            store,
            revision: 0,
        }
    }

    /// The current cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Incremented on every change to the cart; lets observers tell whether
    /// the cart moved since they last looked.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub const fn store(&self) -> &CartStore<S> {
        &self.store
    }

    /// Add units of a product, capped at the product's stock.
    pub fn add_item(
        &mut self,
        product: &Product,
        size: &str,
        quantity: u32,
        color: Option<&str>,
    ) -> AddOutcome {
        let key = LineKey::new(product.id.clone(), size, color);
        let before = self.cart.line(&key).map(|l| l.quantity);
        let outcome = self.cart.add(product, size, quantity, color);

        if outcome.quantity == 0 {
            warn!(
                product_id = %product.id,
                size,
                requested = quantity,
                stock = product.stock,
                "Nothing added: product has no stock"
            );
        } else if outcome.was_clamped() {
            warn!(
                product_id = %product.id,
                size,
                dropped = outcome.dropped,
                stock = product.stock,
                "Quantity capped at available stock"
            );
        }

        if self.cart.line(&key).map(|l| l.quantity) != before {
            let quantity = outcome.quantity.to_string();
            self.changed(
                "Added item",
                &[
                    ("product_id", product.id.as_str()),
                    ("size", size),
                    ("quantity", &quantity),
                ],
            );
        }
        outcome
    }

    /// Remove a line. Missing lines are ignored.
    pub fn remove_item(&mut self, product_id: &ProductId, size: &str, color: Option<&str>) {
        let key = LineKey::new(product_id.clone(), size, color);
        if self.cart.remove(&key) {
            self.changed(
                "Removed item",
                &[("product_id", product_id.as_str()), ("size", size)],
            );
        }
    }

    /// Set a line's quantity. Zero or less removes the line; larger values
    /// are taken as given, without checking stock.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        size: &str,
        quantity: i64,
        color: Option<&str>,
    ) {
        let key = LineKey::new(product_id.clone(), size, color);
        if self.cart.set_quantity(&key, quantity) {
            let quantity = quantity.to_string();
            self.changed(
                "Updated quantity",
                &[
                    ("product_id", product_id.as_str()),
                    ("size", size),
                    ("quantity", &quantity),
                ],
            );
        }
    }

    /// Empty the cart and persist immediately.
    pub fn clear(&mut self) {
        self.cart.clear();
        self.changed("Cleared cart", &[]);
    }

    /// Re-apply the load-time validity filter to the live cart.
    ///
    /// Returns the number of lines dropped.
    pub fn force_clean_cart(&mut self) -> usize {
        let dropped = self.cart.retain_well_formed();
        if dropped > 0 {
            warn!(dropped, "Dropped malformed cart lines");
            let dropped_text = dropped.to_string();
            self.changed("Cleaned cart", &[("dropped", &dropped_text)]);
        }
        dropped
    }

    /// Replace the cart with a reconciled one and persist it.
    pub fn commit(&mut self, cart: Cart) {
        if cart == self.cart {
            return;
        }
        let lines = cart.len().to_string();
        self.cart = cart;
        self.changed("Committed reconciled cart", &[("lines", &lines)]);
    }

    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.cart.total_items()
    }

    #[must_use]
    pub fn total_price(&self) -> Price {
        self.cart.total_price()
    }

    fn changed(&mut self, message: &str, data: &[(&str, &str)]) {
        self.revision += 1;
        self.store.save(&self.cart);
        add_breadcrumb("cart", message, (!data.is_empty()).then_some(data));
    }
}
