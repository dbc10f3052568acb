//! Stock reconciliation commands.
//!
//! # Usage
//!
//! ```bash
//! # Report shortfalls without touching the cart
//! atelier stock check
//!
//! # Refresh snapshots and clamp quantities to what the catalog has
//! atelier stock apply
//! ```

use clap::Subcommand;

use atelier_storefront::error::AppError;
use atelier_storefront::services::apply_fresh_stock;
use atelier_storefront::state::AppState;

use super::{output, render_cart, render_shortfalls};

#[derive(Subcommand)]
pub enum StockAction {
    /// Compare the cart with the live catalog
    Check,
    /// Fold live stock and prices into the cart
    Apply,
}

/// Run a stock command against the persisted cart.
///
/// # Errors
///
/// Returns an error if no product in the cart could be looked up.
pub async fn run(state: &AppState, action: StockAction) -> Result<(), AppError> {
    let mut cart = state.open_cart();
    let check = state.reconciler().check(cart.cart()).await?;

    for id in &check.unknown {
        output(&format!("Could not check {id}; try again later"));
    }

    match action {
        StockAction::Check => {
            if check.is_available() {
                output("All items are in stock");
            } else {
                output("Not enough stock:");
                output(&render_shortfalls(check.shortfalls()));
            }
        }
        StockAction::Apply => {
            let before = cart.total_items();
            cart.commit(apply_fresh_stock(cart.cart(), &check.fresh_products));
            tracing::info!(before, after = cart.total_items(), "Applied fresh stock");
            output(&render_cart(cart.cart()));
        }
    }
    Ok(())
}
