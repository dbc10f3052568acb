//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for callers that drive the whole
//! engine (the CLI), plus the breadcrumb helper used by the cart service.

use thiserror::Error;

use crate::backend::{CatalogError, OrderError};
use crate::config::ConfigError;
use crate::services::checkout::CheckoutError;
use crate::services::klaviyo::KlaviyoError;
use crate::services::reconcile::ReconcileError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Product lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Order submission failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Stock could not be verified.
    #[error("Stock error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Checkout did not complete.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Newsletter service failed.
    #[error("Newsletter error: {0}")]
    Newsletter(#[from] KlaviyoError),

    /// Bad input from the shopper.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Whether this error points at a backend or configuration fault rather
    /// than something the shopper can fix.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::Client(_)
            | Self::Catalog(_)
            | Self::Order(_)
            | Self::Reconcile(_)
            | Self::Newsletter(_) => true,
            Self::Checkout(err) => err.is_fault(),
            Self::BadRequest(_) => false,
        }
    }

    /// Send faults to Sentry and log them. Shopper errors stay out of Sentry.
    pub fn report(&self) {
        if self.is_fault() {
            capture(self, "Storefront error");
        } else {
            tracing::debug!(error = %self, "Shopper error");
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Capture an error to Sentry next to an `error!` event carrying its id.
pub fn capture<E>(err: &E, context: &str)
where
    E: std::error::Error + ?Sized,
{
    let event_id = sentry::capture_error(err);
    tracing::error!(
        error = %err,
        sentry_event_id = %event_id,
        "{context}"
    );
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "tee-01")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
