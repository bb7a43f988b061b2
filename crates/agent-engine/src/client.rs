use reqwest::{RequestBuilder, Response};
use serde_json::json;
use tracing::debug;

use crate::stream::EventStream;
use crate::types::{
    session_id_from_name, AppendEvent, ListEventsResponse, ListSessionsResponse, Operation,
    Session, SessionEvent,
};
use crate::{AgentEngineError, Result};

/// Identifies one deployed reasoning engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineTarget {
    pub project_id: String,
    pub location: String,
    pub resource_id: String,
}

/// Method name the engine dispatches streaming queries to.
const STREAM_METHOD: &str = "async_stream_query";

// ─── AgentEngineClient ────────────────────────────────────────────────────

/// REST client for the sessions and streaming query endpoints of a hosted
/// reasoning engine. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AgentEngineClient {
    http: reqwest::Client,
    resource_url: String,
    token: Option<String>,
}

impl AgentEngineClient {
    /// `api_base` defaults to the regional `aiplatform` host for the target's
    /// location.
    pub fn new(target: &EngineTarget, api_base: Option<&str>, token: Option<String>) -> Self {
        let base = match api_base {
            Some(b) => b.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com/v1beta1", target.location),
        };
        let resource_url = format!(
            "{base}/projects/{}/locations/{}/reasoningEngines/{}",
            target.project_id, target.location, target.resource_id
        );
        Self {
            http: reqwest::Client::new(),
            resource_url,
            token,
        }
    }

    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    /// Create a session for `user_id` and return its id.
    pub async fn create_session(&self, user_id: &str) -> Result<String> {
        let url = format!("{}/sessions", self.resource_url);
        let response = self
            .authorize(self.http.post(&url))
            .json(&json!({ "userId": user_id }))
            .send()
            .await?;
        let op: Operation = check(response).await?.json().await?;
        let id = session_id_from_name(&op.name).ok_or_else(|| {
            AgentEngineError::Unexpected(format!("no session id in resource name {:?}", op.name))
        })?;
        debug!(user_id, session_id = id, "created agent session");
        Ok(id.to_string())
    }

    pub async fn append_event(&self, session_id: &str, event: &AppendEvent) -> Result<()> {
        let url = format!("{}/sessions/{session_id}:appendEvent", self.resource_url);
        let response = self.authorize(self.http.post(&url)).json(event).send().await?;
        check(response).await?;
        debug!(session_id, author = %event.author, "appended session event");
        Ok(())
    }

    /// All sessions owned by `user_id`, in the order the engine lists them.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.sessions_page(user_id, page_token.as_deref()).await?;
            sessions.extend(page.sessions);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(sessions)
    }

    /// Id of the first session listed for the user, if any. Stops paging as
    /// soon as one is seen.
    pub async fn latest_session(&self, user_id: &str) -> Result<Option<String>> {
        let mut page_token: Option<String> = None;
        loop {
            let page = self.sessions_page(user_id, page_token.as_deref()).await?;
            if let Some(first) = page.sessions.first() {
                return Ok(Some(first.id().to_string()));
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(None),
            }
        }
    }

    async fn sessions_page(
        &self,
        user_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListSessionsResponse> {
        let url = format!("{}/sessions", self.resource_url);
        let filter = format!("user_id={user_id}");
        let mut request = self
            .authorize(self.http.get(&url))
            .query(&[("filter", filter.as_str())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        Ok(check(request.send().await?).await?.json().await?)
    }

    pub async fn list_events(&self, session_id: &str) -> Result<Vec<SessionEvent>> {
        let url = format!("{}/sessions/{session_id}/events", self.resource_url);
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.authorize(self.http.get(&url));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ListEventsResponse = check(request.send().await?).await?.json().await?;
            events.extend(page.session_events);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(events)
    }

    /// Send `message` to the agent and stream back the events it produces.
    ///
    /// Errors before the first byte (transport, non-2xx) are returned here;
    /// errors mid-stream arrive as items of the stream.
    pub async fn stream_query(
        &self,
        user_id: &str,
        session_id: &str,
        message: &str,
    ) -> Result<EventStream> {
        let url = format!("{}:streamQuery", self.resource_url);
        let body = json!({
            "class_method": STREAM_METHOD,
            "input": {
                "user_id": user_id,
                "session_id": session_id,
                "message": message,
            }
        });
        let response = self
            .authorize(self.http.post(&url))
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;
        debug!(user_id, session_id, "agent query stream opened");
        Ok(EventStream::from_response(response))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AgentEngineError::Status {
        status: status.as_u16(),
        body,
    })
}
