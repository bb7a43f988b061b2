use crate::cmd::read_payloads;
use crate::output::{print_json, print_table};
use anyhow::Result;
use serde::Serialize;
use shopper_core::config::ShopperConfig;
use shopper_core::{normalize, ProductRecord, RawProductPayload};
use std::path::Path;

#[derive(Serialize)]
struct Failure {
    index: usize,
    error: String,
}

#[derive(Serialize)]
struct Report {
    records: Vec<ProductRecord>,
    failed: Vec<Failure>,
}

/// Normalize every payload in `file`. Availability matrices are expanded
/// through the configured storefront; a product that cannot be normalized is
/// reported and skipped.
pub fn run(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = ShopperConfig::load(config_path)?;
    let catalog = config.storefront.catalog();

    let mut report = Report {
        records: Vec::new(),
        failed: Vec::new(),
    };
    for (index, value) in read_payloads(file)?.into_iter().enumerate() {
        let result = RawProductPayload::from_value(value)
            .and_then(|payload| normalize(payload, catalog.as_ref()));
        match result {
            Ok(record) => report.records.push(record),
            Err(e) => {
                tracing::warn!(index, error = %e, "product not normalized");
                report.failed.push(Failure {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    if json {
        return print_json(&report);
    }

    let rows = report
        .records
        .iter()
        .map(|r| {
            let available = r.variants.iter().filter(|v| v.available).count();
            vec![
                r.product_id.clone(),
                r.title.clone(),
                format!("{available}/{}", r.variants.len()),
            ]
        })
        .collect();
    print_table(&["PRODUCT", "TITLE", "AVAILABLE"], rows);
    for failure in &report.failed {
        println!("failed #{}: {}", failure.index, failure.error);
    }
    Ok(())
}
