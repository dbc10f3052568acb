//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! atelier cart add tee-01 --size M --quantity 2 --color sand
//! atelier cart update tee-01 --size M --quantity 5 --color sand
//! atelier cart remove tee-01 --size M --color sand
//! atelier cart show
//! atelier cart clear
//! atelier cart clean
//! ```

use clap::Subcommand;

use atelier_storefront::backend::Catalog;
use atelier_storefront::error::AppError;
use atelier_storefront::state::AppState;

use super::{output, product_id, render_cart};

#[derive(Subcommand)]
pub enum CartAction {
    /// Add units of a product (capped at its stock)
    Add {
        /// Product id
        product: String,

        /// Size label
        #[arg(short, long)]
        size: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Color, for products that come in several
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Remove a line
    Remove {
        product: String,

        #[arg(short, long)]
        size: String,

        #[arg(short, long)]
        color: Option<String>,
    },
    /// Set a line's quantity (zero or less removes it)
    Update {
        product: String,

        #[arg(short, long)]
        size: String,

        #[arg(short, long, allow_negative_numbers = true)]
        quantity: i64,

        #[arg(short, long)]
        color: Option<String>,
    },
    /// Show the cart and its totals
    Show,
    /// Empty the cart
    Clear,
    /// Drop malformed lines
    Clean,
}

/// Run a cart command against the persisted cart.
///
/// # Errors
///
/// Returns an error if the product id is invalid or the catalog lookup for
/// `add` fails.
pub async fn run(state: &AppState, action: CartAction) -> Result<(), AppError> {
    let mut cart = state.open_cart();

    match action {
        CartAction::Add {
            product,
            size,
            quantity,
            color,
        } => {
            let id = product_id(&product)?;
            let product = state.backend().fetch_product(&id).await?;
            if !product.is_active {
                return Err(AppError::BadRequest(format!(
                    "{} is no longer sold",
                    product.name
                )));
            }
            let outcome = cart.add_item(&product, &size, quantity, color.as_deref());
            if outcome.was_clamped() {
                output(&format!(
                    "Only {} of {} available; {} not added",
                    product.stock, product.name, outcome.dropped
                ));
            }
        }
        CartAction::Remove {
            product,
            size,
            color,
        } => cart.remove_item(&product_id(&product)?, &size, color.as_deref()),
        CartAction::Update {
            product,
            size,
            quantity,
            color,
        } => cart.update_quantity(&product_id(&product)?, &size, quantity, color.as_deref()),
        CartAction::Show => {}
        CartAction::Clear => cart.clear(),
        CartAction::Clean => {
            let dropped = cart.force_clean_cart();
            output(&format!("Dropped {dropped} malformed line(s)"));
        }
    }

    output(&render_cart(cart.cart()));
    Ok(())
}
