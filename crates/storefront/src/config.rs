//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ATELIER_API_URL` - Base URL of the hosted backend (catalog and orders)
//!
//! ## Optional
//! - `ATELIER_API_KEY` - Bearer token for the backend
//! - `ATELIER_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `ATELIER_CART_DIR` - Directory holding the persisted cart (default: .atelier)
//! - `ATELIER_CART_KEY` - Key the cart snapshot is stored under (default: cart)
//! - `KLAVIYO_API_KEY` - Klaviyo private API key (requires `KLAVIYO_LIST_ID`)
//! - `KLAVIYO_LIST_ID` - Newsletter list to subscribe customers to
//! - `KLAVIYO_BASE_URL` - Klaviyo API base (default: <https://a.klaviyo.com/api>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::store::DEFAULT_CART_KEY;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CART_DIR: &str = ".atelier";
const DEFAULT_KLAVIYO_BASE_URL: &str = "https://a.klaviyo.com/api";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Hosted backend connection
    pub backend: BackendConfig,
    /// Where the cart is persisted
    pub cart: CartStoreConfig,
    /// Newsletter subscription (disabled when absent)
    pub klaviyo: Option<KlaviyoConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Hosted backend configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL; `products/{id}` and `orders` are resolved against it
    pub base_url: Url,
    /// Bearer token, if the backend requires one
    pub api_key: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Cart persistence configuration.
#[derive(Debug, Clone)]
pub struct CartStoreConfig {
    /// Directory of the file-backed store
    pub dir: PathBuf,
    /// Key the snapshot is stored under
    pub key: String,
}

/// Klaviyo newsletter configuration.
#[derive(Clone)]
pub struct KlaviyoConfig {
    /// Private API key
    pub api_key: SecretString,
    /// List new subscribers are added to
    pub list_id: String,
    /// API base URL
    pub base_url: String,
}

impl std::fmt::Debug for KlaviyoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlaviyoConfig")
            .field("api_key", &"[REDACTED]")
            .field("list_id", &self.list_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if a secret looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            backend: BackendConfig::from_env()?,
            cart: CartStoreConfig::from_env(),
            klaviyo: KlaviyoConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url("ATELIER_API_URL", &get_required_env("ATELIER_API_URL")?)?;
        let api_key = get_optional_env("ATELIER_API_KEY")
            .map(|key| validated_secret("ATELIER_API_KEY", key))
            .transpose()?;
        let timeout_secs = get_env_or_default(
            "ATELIER_HTTP_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "ATELIER_HTTP_TIMEOUT_SECS".to_string(),
                "must be a positive number of seconds".to_string(),
            )
        })?;

        Ok(Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl CartStoreConfig {
    fn from_env() -> Self {
        Self {
            dir: PathBuf::from(get_env_or_default("ATELIER_CART_DIR", DEFAULT_CART_DIR)),
            key: get_env_or_default("ATELIER_CART_KEY", DEFAULT_CART_KEY),
        }
    }
}

impl KlaviyoConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("KLAVIYO_API_KEY"),
            get_optional_env("KLAVIYO_LIST_ID"),
        ) {
            (Some(key), Some(list_id)) => Ok(Some(Self {
                api_key: validated_secret("KLAVIYO_API_KEY", key)?,
                list_id,
                base_url: get_env_or_default("KLAVIYO_BASE_URL", DEFAULT_KLAVIYO_BASE_URL),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::MissingEnvVar("KLAVIYO_LIST_ID".to_string())),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar("KLAVIYO_API_KEY".to_string())),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a base URL that must be http(s) and able to carry path segments.
fn parse_base_url(var_name: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("expected an http(s) base URL, got {value}"),
        ));
    }
    Ok(url)
}

/// Reject secrets that are obviously placeholders.
fn validate_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

fn validated_secret(var_name: &str, value: String) -> Result<SecretString, ConfigError> {
    validate_secret(&value, var_name)?;
    Ok(SecretString::from(value))
}
