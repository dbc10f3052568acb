//! Catalog product snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A product as published by the catalog.
///
/// The cart keeps a copy of this inside every line. That copy reflects what
/// the shopper saw when the item was added (or last reconciled), not the
/// catalog's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Stable catalog identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price in minor currency units.
    pub price: Price,
    /// Category slug (e.g., "tops").
    #[serde(default)]
    pub category: String,
    /// Available sizes, in display order.
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Available colors, if the product comes in more than one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    /// Image URLs, in display order.
    #[serde(default)]
    pub images: Vec<String>,
    /// Units in stock.
    pub stock: u32,
    /// Whether the product is currently sold.
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Whether at least one unit can be sold right now.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.is_active && self.stock > 0
    }

    /// Units that can actually be sold: zero for inactive products.
    #[must_use]
    pub const fn sellable_stock(&self) -> u32 {
        if self.is_active { self.stock } else { 0 }
    }

    /// A copy of this snapshot marked as no longer sold.
    ///
    /// Used when the catalog no longer knows the product at all.
    #[must_use]
    pub fn delisted(&self) -> Self {
        Self {
            stock: 0,
            is_active: false,
            ..self.clone()
        }
    }
}
