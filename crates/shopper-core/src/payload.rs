//! Typed view of the product payloads returned by the storefront's catalog
//! search tool.
//!
//! Payloads arrive as loose JSON. [`RawProductPayload::from_value`] pulls out
//! the fields the cache cares about and decides, once, where the variant list
//! comes from.

use serde_json::{Map, Value};

use crate::error::{Result, ShopperError};

const ID_KEYS: &[&str] = &["product_id", "id"];
const VARIANT_ID_KEYS: &[&str] = &["variant_id", "id"];
const MATRIX_KEYS: &[&str] = &["availabilityMatrix", "availability_matrix"];
const TITLE_KEY: &str = "title";
const VARIANTS_KEY: &str = "variants";

/// Where a product's variants come from.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantSource {
    /// The payload listed its variants directly.
    Explicit(Vec<RawVariant>),
    /// The payload only carried an encoded availability matrix; the variant
    /// list has to be fetched from the catalog.
    AvailabilityMatrix(Value),
    /// Neither field was present.
    Absent,
}

/// A variant as sent by the search tool, before projection.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVariant {
    pub variant_id: Option<String>,
    pub title: Option<String>,
    pub price: Value,
    pub available: Option<bool>,
}

/// One product from a catalog search result.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProductPayload {
    pub product_id: Option<String>,
    pub title: Option<String>,
    pub variants: VariantSource,
    /// Every other top-level field, passed through untouched.
    pub attributes: Map<String, Value>,
}

impl RawProductPayload {
    /// Parse a single JSON product object.
    ///
    /// Only structural problems are errors (not an object, `variants` not an
    /// array, a variant not an object). A missing id is allowed here and is
    /// dealt with when the record is merged.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(ShopperError::InvalidPayload(
                "product payload must be a JSON object".into(),
            ));
        };

        let product_id = take_string(&mut fields, ID_KEYS);
        let title = take_string(&mut fields, &[TITLE_KEY]);

        let mut matrix = None;
        for key in MATRIX_KEYS {
            if let Some(v) = fields.remove(*key) {
                if !v.is_null() && matrix.is_none() {
                    matrix = Some(v);
                }
            }
        }

        let variants = match fields.remove(VARIANTS_KEY) {
            Some(Value::Array(items)) => VariantSource::Explicit(
                items
                    .into_iter()
                    .map(RawVariant::from_value)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Some(Value::Null) | None => match matrix {
                Some(m) => VariantSource::AvailabilityMatrix(m),
                None => VariantSource::Absent,
            },
            Some(other) => {
                return Err(ShopperError::InvalidPayload(format!(
                    "'variants' must be an array, got {}",
                    type_name(&other)
                )))
            }
        };

        Ok(Self {
            product_id,
            title,
            variants,
            attributes: fields,
        })
    }

    /// Parse a search-tool result: either a bare array of products or an
    /// object wrapping one under `products`.
    pub fn parse_batch(value: Value) -> Result<Vec<Self>> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("products") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(ShopperError::InvalidPayload(
                        "expected an array of products or an object with 'products'".into(),
                    ))
                }
            },
            other => {
                return Err(ShopperError::InvalidPayload(format!(
                    "expected an array of products, got {}",
                    type_name(&other)
                )))
            }
        };
        items.into_iter().map(Self::from_value).collect()
    }
}

impl RawVariant {
    fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(ShopperError::InvalidPayload(
                "variant must be a JSON object".into(),
            ));
        };
        Ok(Self {
            variant_id: take_string(&mut fields, VARIANT_ID_KEYS),
            title: take_string(&mut fields, &[TITLE_KEY]),
            price: fields.remove("price").unwrap_or(Value::Null),
            available: fields
                .remove("available")
                .or_else(|| fields.remove("availableForSale"))
                .and_then(|v| v.as_bool()),
        })
    }
}

/// Remove the first present key and return it as a string. Numeric ids are
/// stringified.
fn take_string(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match fields.remove(*key) {
            Some(Value::String(s)) => return Some(s),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
