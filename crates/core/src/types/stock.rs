//! Stock verdicts produced by reconciliation.

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A product the cart asks for more of than the catalog can supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortfall {
    pub product_id: ProductId,
    pub product_name: String,
    /// Units requested across every line of this product.
    pub requested_quantity: u64,
    /// Units the catalog can sell (0 when inactive or missing).
    pub available_stock: u32,
}

/// Outcome of checking a cart against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckResult {
    pub available: bool,
    pub shortfalls: Vec<Shortfall>,
}

impl StockCheckResult {
    /// Build a verdict; `available` is derived from the shortfall list.
    #[must_use]
    pub fn from_shortfalls(shortfalls: Vec<Shortfall>) -> Self {
        Self {
            available: shortfalls.is_empty(),
            shortfalls,
        }
    }

    /// The verdict for a cart with nothing in it.
    #[must_use]
    pub const fn all_available() -> Self {
        Self {
            available: true,
            shortfalls: Vec::new(),
        }
    }
}

impl Default for StockCheckResult {
    fn default() -> Self {
        Self::all_available()
    }
}
