//! Cart lines and the pure operations over them.
//!
//! Nothing here touches storage. The storefront crate wraps [`Cart`] in a
//! service that persists after every mutation.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;
use super::product::Product;

/// Identity of a cart line: one product in one size and (optional) color.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: String,
    pub color: Option<String>,
}

impl LineKey {
    /// Build a key. A blank color is the same as no color.
    #[must_use]
    pub fn new(product_id: ProductId, size: impl Into<String>, color: Option<&str>) -> Self {
        Self {
            product_id,
            size: size.into(),
            color: normalize_color(color),
        }
    }
}

fn normalize_color(color: Option<&str>) -> Option<String> {
    color
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product snapshot taken when the line was added or last reconciled.
    pub product: Product,
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    /// Whether this line identifies as `key`.
    #[must_use]
    pub fn matches(&self, key: &LineKey) -> bool {
        self.product.id == key.product_id
            && self.size == key.size
            && normalize_color(self.color.as_deref()) == key.color
    }

    /// The line's identity key.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(
            self.product.id.clone(),
            self.size.clone(),
            self.color.as_deref(),
        )
    }

    /// Structural validity: a product id, a size and at least one unit.
    ///
    /// This is the filter applied when a stored cart is loaded and by the
    /// self-heal operation. It says nothing about stock.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.product.id.is_blank() && !self.size.trim().is_empty() && self.quantity > 0
    }

    /// Cached unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// Result of adding units to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Quantity of the line after the add (0 if nothing was added).
    pub quantity: u32,
    /// Requested units that were not added because of stock.
    pub dropped: u32,
}

impl AddOutcome {
    /// Whether part of the request was dropped.
    #[must_use]
    pub const fn was_clamped(&self) -> bool {
        self.dropped > 0
    }
}

/// An ordered collection of cart lines with unique identity keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from lines, merging duplicate keys in first-seen order.
    ///
    /// Merged quantities are not clamped; this is how a stored snapshot
    /// that somehow contains duplicates is brought back to a valid shape.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            let key = line.key();
            if let Some(existing) = cart.items.iter_mut().find(|l| l.matches(&key)) {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            } else {
                cart.items.push(line);
            }
        }
        cart
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.items
    }

    /// Consume the cart and return its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Find the line with the given key.
    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.items.iter().find(|l| l.matches(key))
    }

    /// Add units of a product, capped at `product.stock`.
    ///
    /// An existing line with the same key has its quantity increased; the
    /// cached snapshot of that line is left as is. If the result would be
    /// zero units nothing is inserted.
    pub fn add(
        &mut self,
        product: &Product,
        size: &str,
        quantity: u32,
        color: Option<&str>,
    ) -> AddOutcome {
        let key = LineKey::new(product.id.clone(), size, color);
        let cap = product.stock;

        if let Some(line) = self.items.iter_mut().find(|l| l.matches(&key)) {
            let wanted = line.quantity.saturating_add(quantity);
            let merged = wanted.min(cap);
            let dropped = wanted.saturating_sub(merged);
            if merged == 0 {
                self.items.retain(|l| !l.matches(&key));
            } else {
                line.quantity = merged;
            }
            return AddOutcome {
                quantity: merged,
                dropped,
            };
        }

        let granted = quantity.min(cap);
        if granted > 0 {
            self.items.push(CartLine {
                product: product.clone(),
                size: key.size,
                color: key.color,
                quantity: granted,
            });
        }
        AddOutcome {
            quantity: granted,
            dropped: quantity - granted,
        }
    }

    /// Remove the line with the given key. Returns whether a line was removed.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.items.len();
        self.items.retain(|l| !l.matches(key));
        self.items.len() != before
    }

    /// Set a line's quantity; zero or negative removes the line.
    ///
    /// Not clamped to stock. Returns whether the cart changed.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: i64) -> bool {
        let quantity = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
        if quantity == 0 {
            return self.remove(key);
        }
        match self.items.iter_mut().find(|l| l.matches(key)) {
            Some(line) if line.quantity != quantity => {
                line.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drop lines that are not well formed. Returns how many were dropped.
    pub fn retain_well_formed(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(CartLine::is_well_formed);
        before - self.items.len()
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of cached price times quantity over all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// Units requested per product across all of its lines, in first-seen order.
    #[must_use]
    pub fn requested_by_product(&self) -> Vec<(&Product, u64)> {
        let mut totals: Vec<(&Product, u64)> = Vec::new();
        for line in &self.items {
            let qty = u64::from(line.quantity);
            match totals.iter_mut().find(|(p, _)| p.id == line.product.id) {
                Some((_, total)) => *total += qty,
                None => totals.push((&line.product, qty)),
            }
        }
        totals
    }
}
