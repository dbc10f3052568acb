//! CLI command implementations.

pub mod cart;
pub mod checkout;
pub mod stock;

use atelier_core::{Cart, ProductId, Shortfall};
use atelier_storefront::error::AppError;

/// Parse a product id argument.
fn product_id(raw: &str) -> Result<ProductId, AppError> {
    ProductId::parse(raw).map_err(|e| AppError::BadRequest(format!("product id: {e}")))
}

/// Render the cart as one line per item followed by totals.
fn render_cart(cart: &Cart) -> String {
    if cart.is_empty() {
        return "Cart is empty".to_string();
    }
    let mut out = String::new();
    for line in cart.lines() {
        let variant = line
            .color
            .as_deref()
            .map_or_else(|| line.size.clone(), |color| format!("{}, {color}", line.size));
        out.push_str(&format!(
            "{:>3} x {} [{}] ({variant}) @ {} = {}\n",
            line.quantity,
            line.product.name,
            line.product.id,
            line.product.price,
            line.line_total(),
        ));
    }
    out.push_str(&format!(
        "{} item(s), total {}",
        cart.total_items(),
        cart.total_price()
    ));
    out
}

fn render_shortfalls(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| {
            format!(
                "  {} [{}]: requested {}, available {}",
                s.product_name, s.product_id, s.requested_quantity, s.available_stock
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[allow(clippy::print_stdout)]
fn output(text: &str) {
    println!("{text}");
}
