//! Business logic services for the storefront.
//!
//! # Services
//!
//! - [`cart`] - The live cart: mutations, totals, persistence
//! - [`reconcile`] - Stock checks against the catalog and applying fresh stock
//! - [`checkout`] - Checkout state machine and order submission
//! - [`klaviyo`] - Newsletter sign-up

pub mod cart;
pub mod checkout;
pub mod klaviyo;
pub mod reconcile;

pub use cart::CartService;
pub use checkout::{BlockReason, Checkout, CheckoutError, CheckoutFailure, CheckoutState};
pub use klaviyo::{KlaviyoClient, KlaviyoError, Subscriber};
pub use reconcile::{ReconcileError, StockCheck, StockReconciler, apply_fresh_stock};
