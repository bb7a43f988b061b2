use std::convert::Infallible;

use agent_engine::{AppendEvent, Content, HistoryEntry, SessionEvent};
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use shopper_core::agents::{find_agent, ShopperInput};
use tokio_stream::StreamExt as _;

use crate::error::AppError;
use crate::routes::envelope;
use crate::state::AppState;

/// Author recorded on the state-seeding event of a new session.
const ROOT_AGENT_AUTHOR: &str = "shopify_agent";
/// Author recorded on messages pushed into a session from outside the agent.
const INJECTED_AUTHOR: &str = "suggestion_agent";

#[derive(Debug, Deserialize)]
pub struct CartParams {
    pub cart_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageParams {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendParams {
    pub message: String,
    /// When given, the message is framed with the cart for the shopping agent.
    #[serde(default)]
    pub cart_id: Option<String>,
}

/// One event of the history view: user turns are shown without their cart
/// framing, and a reply from an agent with a structured format carries the
/// validated reply when it matches.
#[derive(Debug, Serialize)]
pub struct HistoryView {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Value>,
}

impl From<&SessionEvent> for HistoryView {
    fn from(event: &SessionEvent) -> Self {
        let mut entry = HistoryEntry::from(event);
        let mut reply = None;
        if let Some(content) = entry.content.as_mut() {
            if let Some(text) = content.parts.text.as_mut() {
                if content.role == "user" {
                    if let Ok(input) = ShopperInput::parse(text.as_str()) {
                        *text = input.user_message;
                    }
                } else if let Some(format) =
                    find_agent(&entry.author).ok().and_then(|a| a.reply_format)
                {
                    match format.validate(text.as_str()) {
                        Ok(value) => reply = Some(value),
                        Err(e) => {
                            tracing::debug!(author = %entry.author, error = %e, "unstructured agent reply")
                        }
                    }
                }
            }
        }
        HistoryView { entry, reply }
    }
}

/// Storefront cart gid for a bare cart token.
fn cart_gid(cart_id: &str) -> String {
    format!("gid://shopify/Cart/{cart_id}")
}

/// POST /api/chat/{user_id}/create-session?cart_id=
pub async fn create_session(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<CartParams>,
) -> Result<Json<Value>, AppError> {
    let session_id = app.engine.create_session(&user_id).await?;

    let mut delta = Map::new();
    delta.insert("cart_id".into(), json!(cart_gid(&params.cart_id)));
    let seed = AppendEvent::new(ROOT_AGENT_AUTHOR).with_state_delta(delta);
    app.engine.append_event(&session_id, &seed).await?;

    tracing::info!(%user_id, %session_id, "session created");
    Ok(envelope(json!({ "sessionId": session_id })))
}

/// POST /api/chat/{session_id}/inject-agent-message?message=
pub async fn inject_agent_message(
    State(app): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<MessageParams>,
) -> Result<Json<Value>, AppError> {
    let event =
        AppendEvent::new(INJECTED_AUTHOR).with_content(Content::text("model", &params.message));
    app.engine.append_event(&session_id, &event).await?;

    tracing::info!(%session_id, "agent message injected");
    Ok(envelope(json!({ "injectedAgentMessage": params.message })))
}

/// POST /api/chat/{user_id}/{session_id}/send-message?message=[&cart_id=] — SSE
/// stream of agent events, one `data:` frame per event. A failure mid-stream
/// is sent as an `error` event and ends the response.
pub async fn send_message(
    State(app): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
    Query(params): Query<SendParams>,
) -> Result<impl IntoResponse, AppError> {
    let message = match &params.cart_id {
        Some(cart_id) => ShopperInput::new(cart_gid(cart_id), &params.message).render(),
        None => params.message,
    };
    let events = app
        .engine
        .stream_query(&user_id, &session_id, &message)
        .await?;
    tracing::info!(%user_id, %session_id, "agent stream started");

    let mut failed = false;
    let stream = events
        .take_while(move |item| {
            let keep = !failed;
            failed |= item.is_err();
            keep
        })
        .map(|item| {
            let event = match item {
                Ok(value) => Event::default().data(value.to_string()),
                Err(e) => {
                    tracing::error!(error = %e, "agent stream failed");
                    Event::default()
                        .event("error")
                        .data(json!({ "error": e.to_string() }).to_string())
                }
            };
            Ok::<Event, Infallible>(event)
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /api/chat/{user_id}/latest-session
pub async fn latest_session(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let latest = app.engine.latest_session(&user_id).await?;
    tracing::info!(%user_id, latest = ?latest, "latest session resolved");
    Ok(envelope(json!({ "latestSessionId": latest })))
}

/// GET /api/chat/{session_id}/history
pub async fn history(
    State(app): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let events = app.engine.list_events(&session_id).await?;
    let history: Vec<HistoryView> = events.iter().map(HistoryView::from).collect();
    tracing::info!(%session_id, events = history.len(), "session history loaded");
    Ok(envelope(json!({ "sessionEvents": history })))
}
