//! Configured collaborators, wired once and shared.

use std::sync::Arc;

use crate::backend::BackendClient;
use crate::config::StorefrontConfig;
use crate::error::AppError;
use crate::services::{CartService, Checkout, KlaviyoClient, StockReconciler};
use crate::store::{CartStore, FileStore};

/// Application state shared across commands.
///
/// This struct is cheaply cloneable via `Arc` and hands out the cart,
/// reconciler and checkout built from one configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    newsletter: Option<KlaviyoClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("backend", &self.inner.backend)
            .field("newsletter", &self.inner.newsletter)
            .finish()
    }
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, AppError> {
        let backend = BackendClient::new(&config.backend)?;
        let newsletter = config
            .klaviyo
            .as_ref()
            .map(KlaviyoClient::new)
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                newsletter,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Load the persisted cart.
    #[must_use]
    pub fn open_cart(&self) -> CartService<FileStore> {
        let cart = &self.inner.config.cart;
        CartService::load(CartStore::with_key(
            FileStore::new(&cart.dir),
            cart.key.clone(),
        ))
    }

    /// A reconciler over the live catalog.
    #[must_use]
    pub fn reconciler(&self) -> StockReconciler<BackendClient> {
        StockReconciler::new(self.inner.backend.clone())
    }

    /// A fresh checkout over the live backend.
    #[must_use]
    pub fn checkout(&self) -> Checkout<BackendClient> {
        Checkout::with_newsletter(self.inner.backend.clone(), self.inner.newsletter.clone())
    }
}
