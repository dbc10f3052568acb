//! Atelier Core - Shared cart and catalog types.
//!
//! This crate provides the types used across the Atelier components:
//! - `storefront` - Cart engine, stock reconciliation and checkout
//! - `cli` - Command-line driver for a locally persisted cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure operations - no I/O, no
//! storage, no HTTP clients. Cart arithmetic lives here so it can be tested
//! without any collaborator.
//!
//! # Modules
//!
//! - [`types`] - Ids, prices, products, cart lines, stock verdicts and order payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
