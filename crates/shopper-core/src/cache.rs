//! Session-scoped product cache.
//!
//! The cache is a plain value: `merge` takes the current state and returns the
//! next one, `lookup` reads it. Whoever owns the session (see
//! [`crate::session::SessionStateStore`]) is responsible for loading it before
//! and storing it after a merge.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::product::ProductRecord;

// ---------------------------------------------------------------------------
// ProductCache
// ---------------------------------------------------------------------------

/// Products seen during one session, keyed by `product_id`.
///
/// At most one record exists per id. Iteration order is an implementation
/// detail and callers must not rely on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProductCache {
    products: BTreeMap<String, ProductRecord>,
}

impl ProductCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, product_id: &str) -> Option<&ProductRecord> {
        self.products.get(product_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductRecord> {
        self.products.values()
    }
}

/// A stored cache is only accepted if every entry is keyed by its own usable
/// `product_id`.
impl<'de> Deserialize<'de> for ProductCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let products = BTreeMap::<String, ProductRecord>::deserialize(deserializer)?;
        for (key, record) in &products {
            if !record.has_usable_id() {
                return Err(D::Error::custom(format!(
                    "cached product under key '{key}' has no usable product_id"
                )));
            }
            if *key != record.product_id {
                return Err(D::Error::custom(format!(
                    "cached product key '{key}' does not match its product_id '{}'",
                    record.product_id
                )));
            }
        }
        Ok(Self { products })
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Why an incoming record was left out of a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingProductId,
}

/// An incoming record that was dropped instead of merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Position of the record in the incoming batch.
    pub index: usize,
    pub title: String,
    pub reason: RejectReason,
}

/// Result of [`merge`]: the next cache state plus any dropped records.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub cache: ProductCache,
    pub rejected: Vec<RejectedRecord>,
}

/// Merge a freshly fetched batch into `existing`.
///
/// Incoming records replace cached records with the same `product_id`;
/// everything else already cached is kept. Records without a usable id are
/// reported in [`MergeOutcome::rejected`] and the rest of the batch still goes
/// in. Within one batch, the last record for an id wins.
pub fn merge(
    existing: ProductCache,
    incoming: impl IntoIterator<Item = ProductRecord>,
) -> MergeOutcome {
    let mut cache = existing;
    let mut rejected = Vec::new();

    for (index, record) in incoming.into_iter().enumerate() {
        if !record.has_usable_id() {
            rejected.push(RejectedRecord {
                index,
                title: record.title,
                reason: RejectReason::MissingProductId,
            });
            continue;
        }
        cache.products.insert(record.product_id.clone(), record);
    }

    MergeOutcome { cache, rejected }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Find cached products whose title contains `query`.
///
/// Both sides are trimmed and lowercased before a plain substring test. An
/// empty or whitespace-only query matches nothing. A miss is an empty vec,
/// which callers treat as "search upstream".
pub fn lookup<'a>(cache: &'a ProductCache, query: &str) -> Vec<&'a ProductRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    cache
        .iter()
        .filter(|record| record.match_key().contains(&needle))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
