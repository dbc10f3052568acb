//! Order payloads exchanged with the order-creation endpoint.

use serde::{Deserialize, Serialize};

use super::cart::Cart;
use super::contact::{Email, PhoneNumber};
use super::id::{OrderId, ProductId};
use super::price::Price;

/// Customer and delivery fields captured by the checkout form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: PhoneNumber,
    pub email: Option<Email>,
    pub delivery_address: String,
    pub delivery_zone: String,
    /// Fee for the chosen delivery zone, looked up by the caller.
    pub delivery_fee: Price,
    /// Opt-in to the newsletter; needs `email` to have any effect.
    pub subscribe_newsletter: bool,
}

/// A checkout field that failed validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct FieldError {
    /// Wire name of the field (e.g., `deliveryAddress`).
    pub field: &'static str,
    pub message: String,
}

impl CustomerDetails {
    /// Check the free-text fields that the typed ones don't cover.
    ///
    /// # Errors
    ///
    /// Returns the first blank required field, or a negative delivery fee.
    pub fn validate(&self) -> Result<(), FieldError> {
        let required = [
            ("customerName", &self.name),
            ("deliveryAddress", &self.delivery_address),
            ("deliveryZone", &self.delivery_zone),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(FieldError {
                    field,
                    message: "is required".to_string(),
                });
            }
        }
        if self.delivery_fee < Price::ZERO {
            return Err(FieldError {
                field: "deliveryFee",
                message: "cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// One ordered line as sent to the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: u32,
    /// Cached unit price at the time of checkout.
    pub price: Price,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer_name: String,
    pub customer_phone: PhoneNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<Email>,
    pub delivery_address: String,
    pub delivery_zone: String,
    pub items: Vec<OrderItem>,
    pub delivery_fee: Price,
    pub total_amount: Price,
}

impl OrderRequest {
    /// Snapshot a cart and the customer's details into an order body.
    ///
    /// `totalAmount` is the cart's cached total plus the delivery fee.
    #[must_use]
    pub fn from_cart(cart: &Cart, details: &CustomerDetails) -> Self {
        let items = cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                product_id: line.product.id.clone(),
                size: line.size.clone(),
                quantity: line.quantity,
                price: line.product.price,
            })
            .collect();

        Self {
            customer_name: details.name.trim().to_owned(),
            customer_phone: details.phone.clone(),
            customer_email: details.email.clone(),
            delivery_address: details.delivery_address.trim().to_owned(),
            delivery_zone: details.delivery_zone.clone(),
            items,
            delivery_fee: details.delivery_fee,
            total_amount: cart.total_price() + details.delivery_fee,
        }
    }
}

/// A created order, as acknowledged by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_number: String,
    pub id: OrderId,
}
