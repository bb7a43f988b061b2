pub mod agents;
pub mod lookup;
pub mod normalize;
pub mod serve;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// Read a search-result file: a JSON array of products, or an object holding
/// one under `products`.
pub(crate) fn read_payloads(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("products") {
            Some(Value::Array(items)) => Ok(items),
            _ => bail!("{}: expected an array of products or an object with 'products'", path.display()),
        },
        _ => bail!("{}: expected an array of products", path.display()),
    }
}
