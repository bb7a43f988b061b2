//! Product-cache tools offered to the shopping agent.
//!
//! The agent calls [`ProductCacheTools::lookup_cached_products`] first and only
//! runs the storefront's catalog search on a miss; the search results are then
//! handed to [`ProductCacheTools::cache_search_results`] before the agent
//! replies.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::cache::{self, RejectedRecord};
use crate::catalog::VariantCatalog;
use crate::normalize::normalize;
use crate::payload::RawProductPayload;
use crate::product::ProductRecord;
use crate::session::SessionStateStore;

pub const LOOKUP_TOOL: &str = "lookup_cached_products";
pub const CACHE_TOOL: &str = "cache_search_results";

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResult {
    /// `false` means the agent should search the catalog.
    pub hit: bool,
    pub products: Vec<ProductRecord>,
}

/// A search result that could not be turned into a cache record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedProduct {
    pub index: usize,
    pub product_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheUpdate {
    /// Ids written to the cache, in batch order.
    pub cached: Vec<String>,
    /// Records dropped at merge time for lacking an id.
    pub rejected: Vec<RejectedRecord>,
    /// Payloads that failed to parse or normalize; not cached.
    pub failed: Vec<FailedProduct>,
    pub cache_size: usize,
}

/// Normalized records waiting to be merged, plus the payloads that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBatch {
    pub records: Vec<ProductRecord>,
    pub failed: Vec<FailedProduct>,
}

// ---------------------------------------------------------------------------
// ProductCacheTools
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ProductCacheTools {
    store: Arc<dyn SessionStateStore>,
    catalog: Arc<dyn VariantCatalog>,
}

impl ProductCacheTools {
    pub fn new(store: Arc<dyn SessionStateStore>, catalog: Arc<dyn VariantCatalog>) -> Self {
        Self { store, catalog }
    }

    pub fn lookup_cached_products(&self, session_id: &str, query: &str) -> LookupResult {
        let cache = self.store.load(session_id);
        let products: Vec<ProductRecord> =
            cache::lookup(&cache, query).into_iter().cloned().collect();
        tracing::debug!(session_id, query, matches = products.len(), "product cache lookup");
        LookupResult {
            hit: !products.is_empty(),
            products,
        }
    }

    /// Normalize and merge one batch of raw search results.
    ///
    /// Products whose payload is unusable or whose variant expansion fails are
    /// skipped and reported; the rest of the batch is still cached.
    pub fn cache_search_results(&self, session_id: &str, payloads: Vec<Value>) -> CacheUpdate {
        let batch = self.prepare_batch(session_id, payloads);
        self.commit_batch(session_id, batch)
    }

    /// Parse and normalize a batch without touching the session cache. This
    /// is the slow half of an update: variant expansion calls the catalog.
    pub fn prepare_batch(&self, session_id: &str, payloads: Vec<Value>) -> PreparedBatch {
        let mut records = Vec::with_capacity(payloads.len());
        let mut failed = Vec::new();

        for (index, value) in payloads.into_iter().enumerate() {
            let payload = match RawProductPayload::from_value(value) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(session_id, index, error = %e, "skipping unparsable product");
                    failed.push(FailedProduct {
                        index,
                        product_id: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            let product_id = payload.product_id.clone();
            match normalize(payload, self.catalog.as_ref()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        session_id,
                        index,
                        product_id = product_id.as_deref().unwrap_or(""),
                        error = %e,
                        "skipping product that failed to normalize"
                    );
                    failed.push(FailedProduct {
                        index,
                        product_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        PreparedBatch { records, failed }
    }

    /// Merge a prepared batch into the session cache and store the result.
    pub fn commit_batch(&self, session_id: &str, batch: PreparedBatch) -> CacheUpdate {
        let PreparedBatch { records, failed } = batch;
        let candidate_ids: Vec<String> = records
            .iter()
            .filter(|r| r.has_usable_id())
            .map(|r| r.product_id.clone())
            .collect();

        let outcome = cache::merge(self.store.load(session_id), records);
        for rejected in &outcome.rejected {
            tracing::warn!(
                session_id,
                title = %rejected.title,
                "dropped product without an id"
            );
        }
        let cache_size = outcome.cache.len();
        self.store.store(session_id, outcome.cache);

        tracing::info!(
            session_id,
            cached = candidate_ids.len(),
            rejected = outcome.rejected.len(),
            failed = failed.len(),
            cache_size,
            "merged search results into product cache"
        );

        CacheUpdate {
            cached: candidate_ids,
            rejected: outcome.rejected,
            failed,
            cache_size,
        }
    }

    pub fn end_session(&self, session_id: &str) {
        self.store.discard(session_id);
        tracing::info!(session_id, "discarded product cache");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
