//! HTTP client for the hosted backend.
//!
//! Uses `reqwest` with a per-request timeout from configuration. Responses
//! are read as text first so decoding failures can be logged with the body.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};
use url::Url;

use atelier_core::{OrderConfirmation, OrderRequest, Product, ProductId};

use super::conversions::{convert_order, convert_product};
use super::types::{ApiResponse, OrderData, ProductData};
use super::{Catalog, CatalogError, OrderError, OrderGateway};
use crate::config::BackendConfig;

/// Longest body excerpt written to logs.
const LOG_BODY_LIMIT: usize = 500;

/// Client for the catalog and order endpoints.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_key", &self.inner.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.inner.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    /// Look up one product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for a 404 or an unsuccessful
    /// envelope, and other variants for transport or decoding failures.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        let url = self.endpoint(&["products", id.as_str()]);
        let response = self.authorize(self.inner.client.get(url)).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(id.clone()));
        }

        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                status = %status,
                body = %excerpt(&body),
                "Catalog returned non-success status"
            );
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: excerpt(&body),
            });
        }

        let envelope: ApiResponse<ProductData> = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, body = %excerpt(&body), "Failed to parse catalog response");
            CatalogError::Parse(e.to_string())
        })?;

        let raw = envelope
            .data
            .and_then(|data| data.product)
            .filter(|_| envelope.success)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;

        let product = convert_product(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        debug!(stock = product.stock, active = product.is_active, "Fetched product");
        Ok(product)
    }

    /// Submit an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Rejected` with the service's error body when it
    /// sends one, and other variants for transport or decoding failures.
    #[instrument(skip(self, order), fields(items = order.items.len(), total = %order.total_amount))]
    pub async fn post_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, OrderError> {
        let url = self.endpoint(&["orders"]);
        let response = self
            .authorize(self.inner.client.post(url))
            .json(order)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: Option<ApiResponse<OrderData>> = serde_json::from_str(&body).ok();

        match envelope {
            Some(ApiResponse {
                error: Some(error), ..
            }) => {
                warn!(
                    status = %status,
                    code = ?error.code,
                    field = ?error.field,
                    "Order rejected"
                );
                Err(OrderError::Rejected {
                    code: error.code,
                    message: error.message,
                    details: error.details,
                    field: error.field,
                })
            }
            Some(ApiResponse {
                success: true,
                data: Some(data),
                ..
            }) if status.is_success() => {
                let confirmation =
                    convert_order(data.order).map_err(|e| OrderError::Parse(e.to_string()))?;
                debug!(order_number = %confirmation.order_number, "Order created");
                Ok(confirmation)
            }
            _ if !status.is_success() => Err(OrderError::Api {
                status: status.as_u16(),
                message: excerpt(&body),
            }),
            _ => {
                warn!(body = %excerpt(&body), "Unexpected order response");
                Err(OrderError::Parse(format!(
                    "unexpected response: {}",
                    excerpt(&body)
                )))
            }
        }
    }
}

impl Catalog for BackendClient {
    async fn fetch_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        self.get_product(id).await
    }
}

impl OrderGateway for BackendClient {
    async fn create_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, OrderError> {
        self.post_order(order).await
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}
