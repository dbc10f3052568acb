//! Atelier Storefront library.
//!
//! The client-side cart engine: a persisted cart, stock reconciliation
//! against the live catalog, and the checkout state machine that turns a
//! verified cart into an order.
//!
//! # Modules
//!
//! - [`store`] - Key-value persistence and the cart snapshot adapter
//! - [`backend`] - Catalog and order collaborators, HTTP client
//! - [`services`] - Cart service, reconciliation, checkout, newsletter
//! - [`config`] - Environment configuration
//! - [`state`] - Wiring of configured collaborators

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod store;
