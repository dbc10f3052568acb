//! Normalization of catalog responses into core types.
//!
//! This is the only place that knows about the backend's shape quirks.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use atelier_core::{OrderConfirmation, OrderId, Price, Product, ProductId};

use super::types::{RawOrder, RawProduct};

/// A response that cannot be turned into a core type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Convert a raw catalog product into the canonical [`Product`].
///
/// # Errors
///
/// Returns `ConversionError` if the id or price is missing or unusable.
pub fn convert_product(raw: RawProduct) -> Result<Product, ConversionError> {
    let id = raw
        .id
        .as_deref()
        .and_then(|id| ProductId::parse(id).ok())
        .ok_or(ConversionError::MissingField("id"))?;

    let price = raw
        .price
        .as_ref()
        .ok_or(ConversionError::MissingField("price"))
        .and_then(|v| integer(v, "price"))?;

    let stock = match raw.stock.as_ref() {
        None | Some(Value::Null) => 0,
        Some(v) => u32::try_from(integer(v, "stock")?.max(0)).unwrap_or(u32::MAX),
    };

    let colors = string_list(raw.colors.as_ref(), "colors");

    Ok(Product {
        id,
        name: raw.name.unwrap_or_default(),
        price: Price::from_minor(price),
        category: raw.category.unwrap_or_default(),
        sizes: string_list(raw.sizes.as_ref(), "sizes"),
        colors: (!colors.is_empty()).then_some(colors),
        images: string_list(raw.images.as_ref(), "images"),
        stock,
        is_active: raw.is_active.unwrap_or(true),
        created_at: timestamp(raw.created_at.as_deref()),
        updated_at: timestamp(raw.updated_at.as_deref()),
    })
}

/// Convert an order acknowledgement.
///
/// # Errors
///
/// Returns `ConversionError` if the id is blank.
pub fn convert_order(raw: RawOrder) -> Result<OrderConfirmation, ConversionError> {
    let id = OrderId::parse(&raw.id).map_err(|_| ConversionError::MissingField("id"))?;
    let order_number = match raw.order_number {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return Err(ConversionError::MissingField("orderNumber")),
    };
    Ok(OrderConfirmation { order_number, id })
}

/// An integer that may be sent as a number or a numeric string.
#[allow(clippy::cast_possible_truncation)] // fract() == 0.0 checked, range saturates
fn integer(value: &Value, field: &'static str) -> Result<i64, ConversionError> {
    let invalid = |reason: String| ConversionError::InvalidField { field, reason };
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| invalid(format!("not an integer: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| invalid(format!("{e}: {s:?}"))),
        other => Err(invalid(format!("unexpected type: {other}"))),
    }
}

/// A list of strings sent as an array, a JSON-encoded array, or a
/// comma-separated string. Blank entries are dropped.
fn string_list(value: Option<&Value>, field: &'static str) -> Vec<String> {
    let items: Vec<String> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
            _ => s.split(',').map(str::to_owned).collect(),
        },
        Some(other) => {
            warn!(field, value = %other, "Ignoring unexpected list value");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: serde_json::Value) -> RawProduct {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_convert_canonical_product() {
        let product = convert_product(raw(json!({
            "id": "p1",
            "name": "Linen Shirt",
            "price": 5900,
            "category": "shirts",
            "sizes": ["S", "M", "L"],
            "colors": ["white"],
            "images": ["https://cdn.example/a.jpg"],
            "stock": 12,
            "isActive": true,
            "createdAt": "2026-03-01T10:00:00Z"
        })))
        .unwrap();

        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.price, Price::from_minor(5900));
        assert_eq!(product.sizes, vec!["S", "M", "L"]);
        assert_eq!(product.colors, Some(vec!["white".to_string()]));
        assert_eq!(product.stock, 12);
        assert!(product.created_at.is_some());
    }

    #[test]
    fn test_convert_json_encoded_lists() {
        let product = convert_product(raw(json!({
            "_id": "p2",
            "name": "Cap",
            "price": "1500",
            "sizes": "[\"OS\"]",
            "colors": "[]",
            "images": "[\"a.jpg\", \"b.jpg\"]",
            "stock": "3",
            "is_active": false
        })))
        .unwrap();

        assert_eq!(product.id.as_str(), "p2");
        assert_eq!(product.price, Price::from_minor(1500));
        assert_eq!(product.sizes, vec!["OS"]);
        assert_eq!(product.colors, None);
        assert_eq!(product.images.len(), 2);
        assert_eq!(product.stock, 3);
        assert!(!product.is_active);
    }

    #[test]
    fn test_convert_comma_separated_sizes() {
        let product = convert_product(raw(json!({
            "id": "p3", "price": 100, "sizes": "S, M ,, L"
        })))
        .unwrap();
        assert_eq!(product.sizes, vec!["S", "M", "L"]);
    }

    #[test]
    fn test_negative_or_missing_stock_is_zero() {
        let product = convert_product(raw(json!({ "id": "p4", "price": 1, "stock": -2 }))).unwrap();
        assert_eq!(product.stock, 0);

        let product = convert_product(raw(json!({ "id": "p4", "price": 1 }))).unwrap();
        assert_eq!(product.stock, 0);
        assert!(product.is_active);
    }

    #[test]
    fn test_missing_id_or_price() {
        assert_eq!(
            convert_product(raw(json!({ "price": 1 }))).unwrap_err(),
            ConversionError::MissingField("id")
        );
        assert_eq!(
            convert_product(raw(json!({ "id": "p5" }))).unwrap_err(),
            ConversionError::MissingField("price")
        );
        assert!(matches!(
            convert_product(raw(json!({ "id": "p5", "price": "cheap" }))),
            Err(ConversionError::InvalidField { field: "price", .. })
        ));
    }

    #[test]
    fn test_convert_order_numeric_number() {
        let order = convert_order(RawOrder {
            order_number: json!(1042),
            id: "o-1".to_string(),
        })
        .unwrap();
        assert_eq!(order.order_number, "1042");
        assert_eq!(order.id.as_str(), "o-1");
    }
}
