//! Wire types for the hosted backend's JSON responses.
//!
//! These mirror the responses as sent, loosely typed where the backend is
//! known to be inconsistent. `conversions` turns them into core types.

use serde::Deserialize;

/// Common response envelope: `{ success, data?, error? }`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorBody>,
}

/// Structured error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
    pub field: Option<String>,
}

/// `data` of a product lookup.
#[derive(Debug, Deserialize)]
pub struct ProductData {
    pub product: Option<RawProduct>,
}

/// A product as the catalog sends it.
///
/// List fields may arrive as arrays or as JSON-encoded strings, numbers may
/// arrive as strings, and the id may be named `_id`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub price: Option<serde_json::Value>,
    pub category: Option<String>,
    pub sizes: Option<serde_json::Value>,
    pub colors: Option<serde_json::Value>,
    pub images: Option<serde_json::Value>,
    pub stock: Option<serde_json::Value>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
    #[serde(alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(alias = "updated_at")]
    pub updated_at: Option<String>,
}

/// `data` of an order creation.
#[derive(Debug, Deserialize)]
pub struct OrderData {
    pub order: RawOrder,
}

/// Created order acknowledgement.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrder {
    pub order_number: serde_json::Value,
    #[serde(alias = "_id")]
    pub id: String,
}
