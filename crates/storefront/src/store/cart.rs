//! Cart snapshot persistence.

use serde::Deserialize;
use tracing::{debug, warn};

use atelier_core::{Cart, CartLine};

use super::{KeyValueStore, StoreError};

/// Default key the cart snapshot is stored under.
pub const DEFAULT_CART_KEY: &str = "cart";

/// Stored envelope. Lines are decoded one by one so a single bad line does
/// not cost the shopper the whole cart.
#[derive(Deserialize)]
struct StoredCart {
    items: Vec<serde_json::Value>,
}

/// Reads and writes the cart snapshot under a single key.
///
/// Loading fails open: anything unreadable becomes an empty cart. Saving is
/// best effort: failures are logged and the in-memory cart stays as it is.
#[derive(Debug, Clone)]
pub struct CartStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> CartStore<S> {
    /// Create an adapter storing the cart under [`DEFAULT_CART_KEY`].
    #[must_use]
    pub fn new(backend: S) -> Self {
        Self::with_key(backend, DEFAULT_CART_KEY)
    }

    /// Create an adapter storing the cart under `key`.
    #[must_use]
    pub fn with_key(backend: S, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// The underlying key-value store.
    #[must_use]
    pub const fn backend(&self) -> &S {
        &self.backend
    }

    /// Load the stored cart.
    ///
    /// Lines without a product id or size, or with a non-positive quantity,
    /// are dropped and the cleaned snapshot is written back. If the snapshot cannot be decoded at all it is removed
    /// and an empty cart is returned.
    pub fn load(&self) -> Cart {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cart::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read stored cart");
                return Cart::new();
            }
        };

        let stored: StoredCart = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding corrupt stored cart");
                self.remove();
                return Cart::new();
            }
        };

        let total = stored.items.len();
        let lines: Vec<CartLine> = stored
            .items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<CartLine>(item).ok())
            .filter(CartLine::is_well_formed)
            .collect();

        let cart = Cart::from_lines(lines);
        if cart.len() < total {
            warn!(
                key = %self.key,
                dropped = total - cart.len(),
                "Cleaned up stored cart lines"
            );
            self.save(&cart);
        }

        cart
    }

    /// Write the full cart snapshot. Failures are logged, never returned.
    pub fn save(&self, cart: &Cart) {
        if let Err(e) = self.try_save(cart) {
            warn!(key = %self.key, error = %e, "Failed to persist cart");
        } else {
            debug!(key = %self.key, lines = cart.len(), "Cart persisted");
        }
    }

    /// Delete the stored snapshot. Failures are logged.
    pub fn remove(&self) {
        if let Err(e) = self.backend.remove(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to remove stored cart");
        }
    }

    fn try_save(&self, cart: &Cart) -> Result<(), StoreError> {
        let json = serde_json::to_string(cart)?;
        self.backend.set(&self.key, &json)
    }
}
