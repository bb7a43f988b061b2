//! External catalog used to expand availability matrices into variant lists.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::CatalogError;
use crate::product::VariantRecord;

/// Storefront header carrying the public access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Storefront-Access-Token";

const VARIANTS_QUERY: &str = r#"query ProductVariants($id: ID!) {
  product(id: $id) {
    variants(first: 250) {
      nodes {
        id
        title
        availableForSale
        price { amount currencyCode }
      }
    }
  }
}"#;

// ---------------------------------------------------------------------------
// VariantCatalog
// ---------------------------------------------------------------------------

/// Source of truth for a product's full variant list.
///
/// Implementations perform one blocking request per call and never retry.
pub trait VariantCatalog: Send + Sync {
    fn fetch_variants(&self, product_id: &str) -> Result<Vec<VariantRecord>, CatalogError>;
}

// ---------------------------------------------------------------------------
// StorefrontCatalog
// ---------------------------------------------------------------------------

/// [`VariantCatalog`] backed by the storefront GraphQL API.
#[derive(Debug, Clone)]
pub struct StorefrontCatalog {
    endpoint: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl StorefrontCatalog {
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_token,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl VariantCatalog for StorefrontCatalog {
    fn fetch_variants(&self, product_id: &str) -> Result<Vec<VariantRecord>, CatalogError> {
        // Built per call: a blocking client must not be created or dropped on
        // an async worker thread, and callers run this on the blocking pool.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let mut request = client.post(&self.endpoint).json(&json!({
            "query": VARIANTS_QUERY,
            "variables": { "id": product_id },
        }));
        if let Some(token) = &self.access_token {
            request = request.header(ACCESS_TOKEN_HEADER, token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        let body = response.text()?;
        parse_variants_response(&body)
    }
}

/// Stand-in used when no storefront endpoint is configured: every expansion
/// fails, explicit variant lists still normalize.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCatalog;

impl VariantCatalog for UnconfiguredCatalog {
    fn fetch_variants(&self, _product_id: &str) -> Result<Vec<VariantRecord>, CatalogError> {
        Err(CatalogError::Unconfigured)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ProductData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProductData {
    product: Option<ProductNode>,
}

#[derive(Debug, Deserialize)]
struct ProductNode {
    variants: VariantConnection,
}

#[derive(Debug, Deserialize)]
struct VariantConnection {
    nodes: Vec<VariantNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantNode {
    id: String,
    title: String,
    available_for_sale: bool,
    #[serde(default)]
    price: Value,
}

fn parse_variants_response(body: &str) -> Result<Vec<VariantRecord>, CatalogError> {
    let parsed: GraphqlResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;

    if !parsed.errors.is_empty() {
        let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
        return Err(CatalogError::Query(messages.join("; ")));
    }

    let product = parsed
        .data
        .and_then(|d| d.product)
        .ok_or_else(|| CatalogError::Malformed("product not found in catalog".into()))?;

    if product.variants.nodes.is_empty() {
        return Err(CatalogError::Malformed("catalog returned no variants".into()));
    }

    Ok(product
        .variants
        .nodes
        .into_iter()
        .map(|node| VariantRecord::new(node.id, node.title, node.price, node.available_for_sale))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
