use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Content ──────────────────────────────────────────────────────────────

/// A message body as stored on session events.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            parts: vec![Part {
                text: Some(text.into()),
                other: Map::new(),
            }],
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.parts.first().and_then(|p| p.text.as_deref())
    }
}

/// One content part. Only text is interpreted; function calls, inline data
/// and the like are kept as-is in `other`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventActions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_delta: Option<Map<String, Value>>,
}

// ─── AppendEvent ──────────────────────────────────────────────────────────

/// Request body for appending an event to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendEvent {
    pub author: String,
    pub invocation_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<EventActions>,
}

impl AppendEvent {
    /// New event stamped now, with a fresh `e-<uuid>` invocation id.
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            invocation_id: new_invocation_id(),
            timestamp: Utc::now(),
            content: None,
            actions: None,
        }
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_state_delta(mut self, delta: Map<String, Value>) -> Self {
        self.actions = Some(EventActions {
            state_delta: Some(delta),
        });
        self
    }
}

pub fn new_invocation_id() -> String {
    format!("e-{}", uuid::Uuid::new_v4())
}

// ─── Sessions and events ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Full resource name, `.../reasoningEngines/<id>/sessions/<session-id>`.
    pub name: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

impl Session {
    pub fn id(&self) -> &str {
        session_id_from_name(&self.name).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    #[serde(default)]
    pub name: Option<String>,
    pub author: String,
    #[serde(default)]
    pub invocation_id: Option<String>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub actions: Option<EventActions>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListSessionsResponse {
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListEventsResponse {
    #[serde(default)]
    pub session_events: Vec<SessionEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Long-running operation returned by session creation. Only the name is
/// needed: it embeds the new session's id.
#[derive(Debug, Deserialize)]
pub(crate) struct Operation {
    pub name: String,
}

/// Extract `<session-id>` from any resource name containing
/// `/sessions/<session-id>`, with or without trailing segments.
pub fn session_id_from_name(name: &str) -> Option<&str> {
    let (_, rest) = name.split_once("/sessions/")?;
    let id = rest.split('/').next().unwrap_or(rest);
    (!id.is_empty()).then_some(id)
}

// ─── History view ─────────────────────────────────────────────────────────

/// Frontend-facing shape of a session event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub author: String,
    pub content: Option<HistoryContent>,
    pub actions: HistoryActions,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryContent {
    pub role: String,
    pub parts: HistoryText,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryText {
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryActions {
    pub state_delta: Option<Map<String, Value>>,
}

impl From<&SessionEvent> for HistoryEntry {
    fn from(event: &SessionEvent) -> Self {
        // Content is only shown when it has both a role and at least one part.
        let content = event.content.as_ref().and_then(|c| {
            let role = c.role.as_ref().filter(|r| !r.is_empty())?;
            let first = c.parts.first()?;
            Some(HistoryContent {
                role: role.clone(),
                parts: HistoryText {
                    text: first.text.clone(),
                },
            })
        });
        let state_delta = event
            .actions
            .as_ref()
            .and_then(|a| a.state_delta.clone())
            .filter(|d| !d.is_empty());

        HistoryEntry {
            author: event.author.clone(),
            content,
            actions: HistoryActions { state_delta },
            timestamp: event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}
