//! Hosted backend collaborators: product catalog and order creation.
//!
//! # Architecture
//!
//! - [`Catalog`] and [`OrderGateway`] are the seams the cart engine depends on
//! - [`BackendClient`] implements both over HTTP with `reqwest`
//! - Raw JSON is normalized once, in `conversions`, into core types
//!
//! # Endpoints
//!
//! - `GET  {base}/products/{id}` - `{ success, data: { product } }`
//! - `POST {base}/orders` - `{ success, data: { order } }` or `{ error: {..} }`

mod client;
mod conversions;
pub mod types;

use std::future::Future;

use thiserror::Error;

use atelier_core::{OrderConfirmation, OrderRequest, Product, ProductId};

pub use client::BackendClient;
pub use conversions::{ConversionError, convert_product};

/// Message shown when the order service gives no usable explanation.
pub const GENERIC_ORDER_FAILURE: &str = "Failed to create order. Please try again.";

/// Errors that can occur when looking up a product.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalog answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Catalog does not know this product.
    #[error("Product not found: {0}")]
    NotFound(ProductId),
}

/// Errors that can occur when submitting an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Order service rejected the order with a structured error.
    #[error("Order rejected ({}): {}", code.as_deref().unwrap_or("UNKNOWN"), message.as_deref().unwrap_or(GENERIC_ORDER_FAILURE))]
    Rejected {
        code: Option<String>,
        message: Option<String>,
        details: Option<serde_json::Value>,
        field: Option<String>,
    },

    /// Order service answered with a non-success status and no error body.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OrderError {
    /// Text to show the shopper: the server's message verbatim when it sent
    /// one, a generic fallback otherwise.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_ORDER_FAILURE.to_string(),
        }
    }
}

/// Read access to the live product catalog.
pub trait Catalog: Send + Sync {
    /// Fetch the current state of one product.
    fn fetch_product(
        &self,
        id: &ProductId,
    ) -> impl Future<Output = Result<Product, CatalogError>> + Send;
}

/// Order creation.
pub trait OrderGateway: Send + Sync {
    /// Submit an order and return the service's acknowledgement.
    fn create_order(
        &self,
        order: &OrderRequest,
    ) -> impl Future<Output = Result<OrderConfirmation, OrderError>> + Send;
}

impl<T: Catalog + ?Sized> Catalog for &T {
    fn fetch_product(
        &self,
        id: &ProductId,
    ) -> impl Future<Output = Result<Product, CatalogError>> + Send {
        (**self).fetch_product(id)
    }
}

impl<T: OrderGateway + ?Sized> OrderGateway for &T {
    fn create_order(
        &self,
        order: &OrderRequest,
    ) -> impl Future<Output = Result<OrderConfirmation, OrderError>> + Send {
        (**self).create_order(order)
    }
}
