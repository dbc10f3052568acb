//! Core types for the Atelier storefront.
//!
//! This module provides type-safe wrappers for the cart and catalog domain.

pub mod cart;
pub mod contact;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod stock;

pub use cart::{AddOutcome, Cart, CartLine, LineKey};
pub use contact::{ContactError, Email, PhoneNumber};
pub use id::*;
pub use order::{CustomerDetails, FieldError, OrderConfirmation, OrderItem, OrderRequest};
pub use price::Price;
pub use product::Product;
pub use stock::{Shortfall, StockCheckResult};
