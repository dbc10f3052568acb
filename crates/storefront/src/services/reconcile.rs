//! Stock reconciliation: comparing the cart's cached snapshots with the live
//! catalog, and folding fresh catalog data back into a cart.

use std::collections::HashMap;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use atelier_core::{Cart, Product, ProductId, Shortfall, StockCheckResult};

use crate::backend::{Catalog, CatalogError};

/// Errors that can occur while checking stock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// No catalog lookup succeeded, so nothing is known about the cart.
    #[error("could not verify stock")]
    Unverified,
}

/// Outcome of a stock check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockCheck {
    /// The verdict shown to the shopper.
    pub result: StockCheckResult,
    /// Current catalog state per product. Products the catalog no longer
    /// knows appear here delisted.
    pub fresh_products: HashMap<ProductId, Product>,
    /// Products whose lookup failed; they are neither shortfalls nor fresh.
    pub unknown: Vec<ProductId>,
}

impl StockCheck {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.result.available
    }

    #[must_use]
    pub fn shortfalls(&self) -> &[Shortfall] {
        &self.result.shortfalls
    }
}

/// Checks carts against the live catalog.
#[derive(Debug, Clone)]
pub struct StockReconciler<C> {
    catalog: C,
}

impl<C> StockReconciler<C> {
    #[must_use]
    pub const fn new(catalog: C) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }
}

impl<C: Catalog> StockReconciler<C> {
    /// Look up every distinct product in the cart and compare the units
    /// requested across its lines with what the catalog can sell.
    ///
    /// Lookups run concurrently. A lookup that fails is logged and its
    /// product reported as unknown; a product the catalog does not have is a
    /// shortfall with nothing available.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Unverified`] when the cart is not empty and
    /// every lookup failed.
    #[instrument(skip_all, fields(lines = cart.len()))]
    pub async fn check(&self, cart: &Cart) -> Result<StockCheck, ReconcileError> {
        let requested = cart.requested_by_product();
        if requested.is_empty() {
            return Ok(StockCheck::default());
        }

        let lookups = requested
            .iter()
            .map(|(product, _)| self.catalog.fetch_product(&product.id));
        let results = join_all(lookups).await;

        let mut fresh_products = HashMap::with_capacity(requested.len());
        let mut unknown = Vec::new();
        let mut shortfalls = Vec::new();

        for ((cached, wanted), result) in requested.into_iter().zip(results) {
            let current = match result {
                Ok(product) if product.id == cached.id => product,
                Ok(product) => {
                    debug!(
                        product_id = %cached.id,
                        canonical_id = %product.id,
                        "Catalog answered under another id"
                    );
                    Product {
                        id: cached.id.clone(),
                        ..product
                    }
                }
                Err(CatalogError::NotFound(_)) => {
                    debug!(product_id = %cached.id, "Product no longer in catalog");
                    cached.delisted()
                }
                Err(e) => {
                    warn!(product_id = %cached.id, error = %e, "Stock lookup failed");
                    unknown.push(cached.id.clone());
                    continue;
                }
            };

            let available = current.sellable_stock();
            if u64::from(available) < wanted {
                shortfalls.push(Shortfall {
                    product_id: cached.id.clone(),
                    product_name: current.name.clone(),
                    requested_quantity: wanted,
                    available_stock: available,
                });
            }
            fresh_products.insert(cached.id.clone(), current);
        }

        if fresh_products.is_empty() {
            warn!(failed = unknown.len(), "No stock lookup succeeded");
            return Err(ReconcileError::Unverified);
        }

        debug!(
            checked = fresh_products.len(),
            shortfalls = shortfalls.len(),
            unknown = unknown.len(),
            "Stock checked"
        );

        Ok(StockCheck {
            result: StockCheckResult::from_shortfalls(shortfalls),
            fresh_products,
            unknown,
        })
    }
}

/// Fold fresh catalog data into a cart.
///
/// `fresh` is keyed by the id the cart knows the product under. Lines of a
/// product with fresh data take the fresh snapshot under that same id, and the
/// product's sellable stock is handed out to its lines in cart order, so the
/// lines of one product never ask for more than it has in total. Lines whose
/// product is inactive or out of stock, or that end up with no units, are
/// dropped. Lines without fresh data keep their snapshot and face the same
/// filter.
///
/// Applying the same fresh data twice gives the same cart.
#[must_use]
pub fn apply_fresh_stock(cart: &Cart, fresh: &HashMap<ProductId, Product>) -> Cart {
    let mut remaining: HashMap<&ProductId, u32> = fresh
        .iter()
        .map(|(id, product)| (id, product.sellable_stock()))
        .collect();

    let mut lines = Vec::with_capacity(cart.len());
    for line in cart.lines() {
        let mut line = line.clone();
        if let (Some(current), Some(left)) = (
            fresh.get(&line.product.id),
            remaining.get_mut(&line.product.id),
        ) {
            line.quantity = line.quantity.min(*left);
            *left -= line.quantity;
            line.product = Product {
                id: line.product.id.clone(),
                ..current.clone()
            };
        }
        if line.product.is_purchasable() && line.quantity > 0 {
            lines.push(line);
        }
    }

    Cart::from_lines(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use atelier_core::Price;
    use proptest::prelude::*;

    use super::*;

    enum Entry {
        Found(Product),
        Missing,
        Down,
    }

    #[derive(Default)]
    struct FakeCatalog {
        entries: HashMap<ProductId, Entry>,
        calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn with(mut self, id: &str, entry: Entry) -> Self {
            self.entries.insert(ProductId::parse(id).unwrap(), entry);
            self
        }
    }

    impl Catalog for FakeCatalog {
        async fn fetch_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.entries.get(id) {
                Some(Entry::Found(product)) => Ok(product.clone()),
                Some(Entry::Missing) | None => Err(CatalogError::NotFound(id.clone())),
                Some(Entry::Down) => Err(CatalogError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                }),
            }
        }
    }

    fn product(id: &str, stock: u32) -> Product {
        Product {
            id: ProductId::parse(id).unwrap(),
            name: format!("Product {id}"),
            price: Price::from_minor(2500),
            category: "outerwear".to_string(),
            sizes: vec!["M".to_string(), "L".to_string()],
            colors: None,
            images: vec![],
            stock,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn inactive(id: &str, stock: u32) -> Product {
        Product {
            is_active: false,
            ..product(id, stock)
        }
    }

    #[tokio::test]
    async fn test_empty_cart_is_available_without_lookups() {
        let catalog = FakeCatalog::default();
        let reconciler = StockReconciler::new(&catalog);

        let check = reconciler.check(&Cart::new()).await.unwrap();
        assert_eq!(check.result, StockCheckResult::all_available());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shortfall_then_clamp() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 8, None);
        let catalog = FakeCatalog::default().with("p1", Entry::Found(product("p1", 3)));

        let check = StockReconciler::new(&catalog).check(&cart).await.unwrap();
        assert!(!check.is_available());
        assert_eq!(
            check.shortfalls(),
            &[Shortfall {
                product_id: ProductId::parse("p1").unwrap(),
                product_name: "Product p1".to_string(),
                requested_quantity: 8,
                available_stock: 3,
            }]
        );

        let applied = apply_fresh_stock(&cart, &check.fresh_products);
        assert_eq!(applied.lines().len(), 1);
        assert_eq!(applied.lines()[0].quantity, 3);
        assert_eq!(applied.lines()[0].product.stock, 3);
    }

    #[tokio::test]
    async fn test_inactive_product_is_dropped() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 1, None);
        cart.add(&product("p2", 10), "L", 2, None);
        let catalog = FakeCatalog::default()
            .with("p1", Entry::Found(inactive("p1", 40)))
            .with("p2", Entry::Found(product("p2", 10)));

        let check = StockReconciler::new(&catalog).check(&cart).await.unwrap();
        assert_eq!(check.shortfalls().len(), 1);
        assert_eq!(check.shortfalls()[0].available_stock, 0);

        let applied = apply_fresh_stock(&cart, &check.fresh_products);
        assert_eq!(applied.lines().len(), 1);
        assert_eq!(applied.lines()[0].product.id.as_str(), "p2");
    }

    #[tokio::test]
    async fn test_missing_product_is_a_shortfall() {
        let mut cart = Cart::new();
        cart.add(&product("gone", 5), "M", 2, None);
        let catalog = FakeCatalog::default().with("gone", Entry::Missing);

        let check = StockReconciler::new(&catalog).check(&cart).await.unwrap();
        assert_eq!(check.shortfalls()[0].requested_quantity, 2);
        assert_eq!(check.shortfalls()[0].available_stock, 0);
        assert!(apply_fresh_stock(&cart, &check.fresh_products).is_empty());
    }

    #[tokio::test]
    async fn test_requested_quantity_sums_lines() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 3, None);
        cart.add(&product("p1", 10), "L", 3, None);
        let catalog = FakeCatalog::default().with("p1", Entry::Found(product("p1", 4)));

        let check = StockReconciler::new(&catalog).check(&cart).await.unwrap();
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert_eq!(check.shortfalls()[0].requested_quantity, 6);

        let applied = apply_fresh_stock(&cart, &check.fresh_products);
        let quantities: Vec<u32> = applied.lines().iter().map(|l| l.quantity).collect();
        assert_eq!(quantities, vec![3, 1]);
    }

    #[test]
    fn test_stock_is_shared_across_lines_in_cart_order() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 2, None);
        cart.add(&product("p1", 10), "L", 5, None);
        cart.add(&product("p1", 10), "M", 4, Some("sand"));
        cart.add(&product("p2", 10), "M", 1, None);
        let fresh: HashMap<ProductId, Product> = [product("p1", 6), product("p2", 10)]
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let applied = apply_fresh_stock(&cart, &fresh);
        let lines: Vec<(&str, &str, u32)> = applied
            .lines()
            .iter()
            .map(|l| (l.product.id.as_str(), l.size.as_str(), l.quantity))
            .collect();
        // The third p1 line gets nothing left and is dropped
        assert_eq!(lines, vec![("p1", "M", 2), ("p1", "L", 4), ("p2", "M", 1)]);

        let p1_units: u32 = applied
            .lines()
            .iter()
            .filter(|l| l.product.id.as_str() == "p1")
            .map(|l| l.quantity)
            .sum();
        assert_eq!(p1_units, 6);
    }

    #[tokio::test]
    async fn test_canonical_id_from_catalog_keeps_cart_identity() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 2, None);
        let catalog =
            FakeCatalog::default().with("p1", Entry::Found(product("P1-canonical", 10)));

        let check = StockReconciler::new(&catalog).check(&cart).await.unwrap();
        assert!(check.is_available());
        assert_eq!(
            check.fresh_products[&ProductId::parse("p1").unwrap()].id.as_str(),
            "p1"
        );

        let applied = apply_fresh_stock(&cart, &check.fresh_products);
        assert_eq!(applied.lines().len(), 1);
        assert_eq!(applied.lines()[0].quantity, 2);
        assert_eq!(applied.lines()[0].product.id.as_str(), "p1");
    }

    #[test]
    fn test_apply_keeps_cart_id_when_fresh_id_differs() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 2, None);
        let fresh = HashMap::from([(ProductId::parse("p1").unwrap(), product("other", 1))]);

        let applied = apply_fresh_stock(&cart, &fresh);
        assert_eq!(applied.lines().len(), 1);
        assert_eq!(applied.lines()[0].quantity, 1);
        assert_eq!(applied.lines()[0].product.id.as_str(), "p1");
    }

    #[tokio::test]
    async fn test_failed_lookup_is_unknown() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 2, None);
        cart.add(&product("p2", 10), "M", 2, None);
        let catalog = FakeCatalog::default()
            .with("p1", Entry::Down)
            .with("p2", Entry::Found(product("p2", 10)));

        let check = StockReconciler::new(&catalog).check(&cart).await.unwrap();
        assert!(check.is_available());
        assert_eq!(check.unknown, vec![ProductId::parse("p1").unwrap()]);
        assert!(!check.fresh_products.contains_key(&ProductId::parse("p1").unwrap()));
    }

    #[tokio::test]
    async fn test_all_lookups_failed_is_unverified() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 2, None);
        let catalog = FakeCatalog::default().with("p1", Entry::Down);

        let err = StockReconciler::new(&catalog).check(&cart).await.unwrap_err();
        assert_eq!(err, ReconcileError::Unverified);
        assert_eq!(err.to_string(), "could not verify stock");
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 6, None);
        cart.add(&product("p1", 10), "L", 4, Some("sand"));
        cart.add(&product("p2", 10), "M", 2, None);
        cart.add(&product("p3", 10), "M", 1, None);
        let fresh: HashMap<ProductId, Product> = [product("p1", 7), inactive("p2", 9)]
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let once = apply_fresh_stock(&cart, &fresh);
        let twice = apply_fresh_stock(&once, &fresh);
        assert_eq!(once, twice);
        assert_eq!(once.total_items(), 8);
    }

    #[test]
    fn test_apply_keeps_lines_without_fresh_data() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 2, None);

        let applied = apply_fresh_stock(&cart, &HashMap::new());
        assert_eq!(applied, cart);
    }

    #[test]
    fn test_apply_refreshes_snapshot() {
        let mut cart = Cart::new();
        cart.add(&product("p1", 10), "M", 2, None);
        let repriced = Product {
            price: Price::from_minor(1999),
            ..product("p1", 10)
        };
        let fresh = HashMap::from([(repriced.id.clone(), repriced)]);

        let applied = apply_fresh_stock(&cart, &fresh);
        assert_eq!(applied.total_price(), Price::from_minor(3998));
        // Input is untouched
        assert_eq!(cart.total_price(), Price::from_minor(5000));
    }

    const IDS: [&str; 3] = ["p1", "p2", "p3"];
    const SIZES: [&str; 3] = ["S", "M", "L"];

    fn arb_cart() -> impl Strategy<Value = Cart> {
        let stocks = proptest::array::uniform3(0..12u32);
        let adds = proptest::collection::vec((0..3usize, 0..3usize, 1..8u32), 0..12);
        (stocks, adds).prop_map(|(stocks, adds)| {
            let mut cart = Cart::new();
            for (index, size, quantity) in adds {
                cart.add(&product(IDS[index], stocks[index]), SIZES[size], quantity, None);
            }
            cart
        })
    }

    /// Per product: no fresh data, or a fresh snapshot with some stock.
    fn arb_fresh() -> impl Strategy<Value = HashMap<ProductId, Product>> {
        proptest::array::uniform3(proptest::option::of((0..12u32, any::<bool>()))).prop_map(
            |entries| {
                IDS.iter()
                    .zip(entries)
                    .filter_map(|(id, entry)| {
                        let (stock, is_active) = entry?;
                        let fresh = Product {
                            is_active,
                            ..product(id, stock)
                        };
                        Some((fresh.id.clone(), fresh))
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn test_apply_fresh_stock_laws(cart in arb_cart(), fresh in arb_fresh()) {
            let once = apply_fresh_stock(&cart, &fresh);
            let twice = apply_fresh_stock(&once, &fresh);
            prop_assert_eq!(&twice, &once);

            for line in once.lines() {
                prop_assert!(line.quantity >= 1);
                prop_assert!(line.quantity <= line.product.stock);
                prop_assert!(line.product.is_purchasable());
            }

            for (id, product) in &fresh {
                let units: u32 = once
                    .lines()
                    .iter()
                    .filter(|l| &l.product.id == id)
                    .map(|l| l.quantity)
                    .sum();
                prop_assert!(units <= product.sellable_stock());
            }
        }
    }
}
