use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopperError {
    #[error("invalid product payload: {0}")]
    InvalidPayload(String),

    #[error("failed to normalize product '{product_id}': {source}")]
    Normalization {
        product_id: String,
        #[source]
        source: CatalogError,
    },

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("invalid agent reply: {0}")]
    InvalidReply(String),

    #[error("invalid shopper input: {0}")]
    InvalidInput(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failures of the external catalog query used during matrix expansion.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog responded with HTTP {0}")]
    Status(u16),

    #[error("catalog returned errors: {0}")]
    Query(String),

    #[error("malformed catalog response: {0}")]
    Malformed(String),

    #[error("no catalog endpoint configured")]
    Unconfigured,
}

pub type Result<T> = std::result::Result<T, ShopperError>;
