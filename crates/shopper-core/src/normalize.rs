use crate::catalog::VariantCatalog;
use crate::error::{Result, ShopperError};
use crate::payload::{RawProductPayload, RawVariant, VariantSource};
use crate::product::{ProductRecord, VariantRecord};

/// Turn a raw search payload into a cacheable [`ProductRecord`].
///
/// Explicit variants are projected down to id/title/price/availability. An
/// availability matrix is replaced by the variant list fetched from
/// `catalog`; that is the only path that touches the network and the only
/// path that can fail with [`ShopperError::Normalization`]. What to do with a
/// failed product (skip it or abort the batch) is up to the caller.
pub fn normalize(payload: RawProductPayload, catalog: &dyn VariantCatalog) -> Result<ProductRecord> {
    let RawProductPayload {
        product_id,
        title,
        variants,
        attributes,
    } = payload;

    let variants = match variants {
        VariantSource::Explicit(raw) => raw.into_iter().map(project_variant).collect(),
        VariantSource::Absent => Vec::new(),
        VariantSource::AvailabilityMatrix(_) => {
            let id = product_id.as_deref().unwrap_or("").trim();
            if id.is_empty() {
                return Err(ShopperError::InvalidPayload(
                    "availability matrix present but product has no id".into(),
                ));
            }
            catalog
                .fetch_variants(id)
                .map_err(|source| ShopperError::Normalization {
                    product_id: id.to_string(),
                    source,
                })?
        }
    };

    Ok(ProductRecord {
        product_id: product_id.unwrap_or_default(),
        title: title.unwrap_or_default(),
        variants,
        attributes,
    })
}

fn project_variant(raw: RawVariant) -> VariantRecord {
    VariantRecord {
        variant_id: raw.variant_id.unwrap_or_default(),
        title: raw.title.unwrap_or_default(),
        price: raw.price,
        available: raw.available.unwrap_or(false),
    }
}
