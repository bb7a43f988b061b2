use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// ProductRecord
// ---------------------------------------------------------------------------

/// A normalized catalog product as held in a session's product cache.
///
/// `product_id` is the dedup key. Catalog attributes the cache has no
/// opinion about (price range, images, url, description, ...) are kept
/// verbatim in `attributes` and flattened back out on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variants: Vec<VariantRecord>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ProductRecord {
    pub fn new(product_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            title: title.into(),
            variants: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_variants(mut self, variants: Vec<VariantRecord>) -> Self {
        self.variants = variants;
        self
    }

    /// `true` when the record carries an id the cache can key on.
    pub fn has_usable_id(&self) -> bool {
        !self.product_id.trim().is_empty()
    }

    /// Title folded for substring matching.
    pub(crate) fn match_key(&self) -> String {
        self.title.trim().to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// VariantRecord
// ---------------------------------------------------------------------------

/// One purchasable variant of a product.
///
/// `price` is whatever the catalog sent (a decimal string, or an
/// `{amount, currencyCode}` object); it is never parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub variant_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub available: bool,
}

impl VariantRecord {
    pub fn new(
        variant_id: impl Into<String>,
        title: impl Into<String>,
        price: Value,
        available: bool,
    ) -> Self {
        Self {
            variant_id: variant_id.into(),
            title: title.into(),
            price,
            available,
        }
    }
}
