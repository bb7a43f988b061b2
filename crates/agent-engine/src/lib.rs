//! `agent-engine`: async client for a hosted reasoning engine.
//!
//! Covers the calls the shopper backend makes against the engine's REST
//! surface: session creation, event append and listing, and streaming
//! queries.
//!
//! ```text
//! AgentEngineClient
//!     │  POST {resource}/sessions, :appendEvent, GET .../events
//!     │  POST {resource}:streamQuery
//!     ▼
//! EventStream     ← futures::Stream<Item = Result<serde_json::Value>>
//!                   background task decodes the NDJSON body line by line
//! ```

pub mod client;
pub mod error;
pub mod stream;
pub mod types;


pub use client::{AgentEngineClient, EngineTarget};
pub use error::AgentEngineError;
pub use stream::EventStream;
pub use types::{
    new_invocation_id, session_id_from_name, AppendEvent, Content, EventActions, HistoryEntry,
    Part, Session, SessionEvent,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, AgentEngineError>;
