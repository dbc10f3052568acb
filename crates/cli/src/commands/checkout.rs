//! Checkout command.
//!
//! # Usage
//!
//! ```bash
//! atelier checkout --name "Ada Lovelace" --phone "+1 555 010 2030" \
//!     --email ada@example.org --newsletter \
//!     --address "12 Analytical Row" --zone central --delivery-fee 500
//!
//! # Adjust the cart to available stock automatically when blocked
//! atelier checkout ... --resolve
//! ```

use clap::Args;

use atelier_core::{CustomerDetails, Email, PhoneNumber, Price};
use atelier_storefront::error::AppError;
use atelier_storefront::services::{BlockReason, CheckoutError};
use atelier_storefront::state::AppState;

use super::{output, render_cart, render_shortfalls};

#[derive(Args)]
pub struct CheckoutArgs {
    /// Customer name
    #[arg(short, long)]
    name: String,

    /// Contact phone number
    #[arg(short, long)]
    phone: String,

    /// Email for the receipt and newsletter
    #[arg(short, long)]
    email: Option<String>,

    /// Delivery address
    #[arg(short, long)]
    address: String,

    /// Delivery zone
    #[arg(short, long)]
    zone: String,

    /// Delivery fee for the zone, in minor units
    #[arg(long, default_value_t = 0)]
    delivery_fee: i64,

    /// Subscribe to the newsletter (needs --email)
    #[arg(long)]
    newsletter: bool,

    /// When blocked on stock, adjust the cart and try once more
    #[arg(long)]
    resolve: bool,
}

impl CheckoutArgs {
    fn details(&self) -> Result<CustomerDetails, AppError> {
        let bad = |e: atelier_core::ContactError| AppError::BadRequest(e.to_string());
        Ok(CustomerDetails {
            name: self.name.clone(),
            phone: PhoneNumber::parse(&self.phone).map_err(bad)?,
            email: self.email.as_deref().map(Email::parse).transpose().map_err(bad)?,
            delivery_address: self.address.clone(),
            delivery_zone: self.zone.clone(),
            delivery_fee: Price::from_minor(self.delivery_fee),
            subscribe_newsletter: self.newsletter,
        })
    }
}

/// Validate stock and place the order for the persisted cart.
///
/// # Errors
///
/// Returns the checkout error when the order could not be placed.
pub async fn run(state: &AppState, args: CheckoutArgs) -> Result<(), AppError> {
    let details = args.details()?;
    let mut cart = state.open_cart();
    let mut checkout = state.checkout();

    let mut result = checkout.submit(&mut cart, &details).await;

    if let Err(CheckoutError::Blocked(BlockReason::Shortfalls(shortfalls))) = &result {
        output("Not enough stock:");
        output(&render_shortfalls(shortfalls));
        if let Some(check) = checkout.last_check() {
            for product_id in &check.unknown {
                output(&format!("  {product_id}: stock could not be checked"));
            }
        }
        if args.resolve {
            checkout.resolve_shortfalls(&mut cart).await?;
            if cart.cart().is_empty() {
                output("Nothing left in the cart after adjusting to stock");
                return Ok(());
            }
            output("Cart adjusted to available stock:");
            output(&render_cart(cart.cart()));
            result = checkout.submit(&mut cart, &details).await;
        }
    }

    let confirmation = result?;
    output(&format!(
        "Order {} placed (id {})",
        confirmation.order_number, confirmation.id
    ));
    Ok(())
}
