use crate::cmd::read_payloads;
use crate::output::{print_json, print_table};
use anyhow::Result;
use shopper_core::catalog::UnconfiguredCatalog;
use shopper_core::session::InMemorySessionStore;
use shopper_core::tools::ProductCacheTools;
use std::path::Path;
use std::sync::Arc;

const OFFLINE_SESSION: &str = "offline";

/// Cache the payloads in `file` the way the agent tool does, then look up
/// `query`. Runs without a storefront, so matrix-only products are skipped.
pub fn run(file: &Path, query: &str, json: bool) -> Result<()> {
    let payloads = read_payloads(file)?;
    let tools = ProductCacheTools::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(UnconfiguredCatalog),
    );

    let update = tools.cache_search_results(OFFLINE_SESSION, payloads);
    let result = tools.lookup_cached_products(OFFLINE_SESSION, query);

    if json {
        return print_json(&serde_json::json!({
            "cache": update,
            "lookup": result,
        }));
    }

    if !result.hit {
        println!(
            "No cached product matches '{}' ({} cached, {} skipped).",
            query.trim(),
            update.cache_size,
            update.rejected.len() + update.failed.len()
        );
        return Ok(());
    }

    let rows = result
        .products
        .iter()
        .map(|p| vec![p.product_id.clone(), p.title.clone(), p.variants.len().to_string()])
        .collect();
    print_table(&["PRODUCT", "TITLE", "VARIANTS"], rows);
    Ok(())
}
