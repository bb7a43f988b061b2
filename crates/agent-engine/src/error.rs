use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentEngineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent engine responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse event line: {source}\n  line: {line}")]
    Parse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}
