//! Klaviyo API client for newsletter sign-up.
//!
//! Only the subscribe call is used: a customer who ticks the newsletter box
//! at checkout is added to the configured list after the order is confirmed.

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use atelier_core::Email;

use crate::config::KlaviyoConfig;

/// Klaviyo API version.
const API_REVISION: &str = "2024-10-15";

/// Source recorded on the subscription.
const CUSTOM_SOURCE: &str = "Atelier Checkout";

/// Errors that can occur when interacting with Klaviyo API.
#[derive(Debug, Error)]
pub enum KlaviyoError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Something that can put an email address on the newsletter list.
pub trait Subscriber: Send + Sync {
    fn subscribe(&self, email: &Email) -> impl Future<Output = Result<(), KlaviyoError>> + Send;
}

/// Klaviyo API client for subscription management.
#[derive(Clone)]
pub struct KlaviyoClient {
    client: reqwest::Client,
    base_url: String,
    list_id: String,
}

impl std::fmt::Debug for KlaviyoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlaviyoClient")
            .field("base_url", &self.base_url)
            .field("list_id", &self.list_id)
            .finish_non_exhaustive()
    }
}

impl KlaviyoClient {
    /// Create a new Klaviyo API client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &KlaviyoConfig) -> Result<Self, KlaviyoError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Klaviyo-API-Key {}", config.api_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| KlaviyoError::Config(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);

        headers.insert("revision", HeaderValue::from_static(API_REVISION));
        headers.insert(
            "Content-Type",
            HeaderValue::from_static("application/vnd.api+json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            list_id: config.list_id.clone(),
        })
    }

    /// Subscribe an email to the newsletter list.
    ///
    /// Creates or updates a profile and subscribes them to the configured list.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, email), fields(list_id = %self.list_id))]
    pub async fn subscribe_email(&self, email: &Email) -> Result<(), KlaviyoError> {
        let url = format!("{}/profile-subscription-bulk-create-jobs", self.base_url);

        let body = serde_json::json!({
            "data": {
                "type": "profile-subscription-bulk-create-job",
                "attributes": {
                    "custom_source": CUSTOM_SOURCE,
                    "profiles": {
                        "data": [{
                            "type": "profile",
                            "attributes": {
                                "email": email.as_str(),
                                "subscriptions": {
                                    "email": {
                                        "marketing": {
                                            "consent": "SUBSCRIBED"
                                        }
                                    }
                                }
                            }
                        }]
                    }
                },
                "relationships": {
                    "list": {
                        "data": {
                            "type": "list",
                            "id": self.list_id
                        }
                    }
                }
            }
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        // 202 Accepted is the expected response for bulk jobs
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(KlaviyoError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

impl Subscriber for KlaviyoClient {
    async fn subscribe(&self, email: &Email) -> Result<(), KlaviyoError> {
        self.subscribe_email(email).await
    }
}
