pub mod agents;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod normalize;
pub mod payload;
pub mod product;
pub mod prompts;
pub mod session;
pub mod tools;

pub use cache::{lookup, merge, MergeOutcome, ProductCache, RejectReason, RejectedRecord};
pub use error::{CatalogError, Result, ShopperError};
pub use normalize::normalize;
pub use payload::{RawProductPayload, RawVariant, VariantSource};
pub use product::{ProductRecord, VariantRecord};
