use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use agent_engine::{AgentEngineClient, EngineTarget};
use shopper_core::config::ShopperConfig;
use shopper_core::session::{InMemorySessionStore, SessionStateStore};
use shopper_core::tools::ProductCacheTools;

type SessionLocks = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: AgentEngineClient,
    pub tools: ProductCacheTools,
    /// Upper bound on one cache update, catalog calls included.
    pub tool_timeout: Duration,
    session_locks: Arc<Mutex<SessionLocks>>,
}

impl AppState {
    pub fn new(engine: AgentEngineClient, tools: ProductCacheTools, tool_timeout: Duration) -> Self {
        Self {
            engine,
            tools,
            tool_timeout,
            session_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wire up the engine client, an in-memory session store and the
    /// configured storefront catalog.
    pub fn from_config(config: &ShopperConfig) -> shopper_core::Result<Self> {
        let coords = config.agent_engine.coordinates()?;
        let target = EngineTarget {
            project_id: coords.project_id,
            location: coords.location,
            resource_id: coords.resource_id,
        };
        let engine = AgentEngineClient::new(
            &target,
            config.agent_engine.api_base.as_deref(),
            config.agent_engine.access_token.clone(),
        );
        let store: Arc<dyn SessionStateStore> = Arc::new(InMemorySessionStore::with_idle_ttl(
            Duration::from_secs(config.server.session_idle_secs),
        ));
        let tools = ProductCacheTools::new(store, config.storefront.catalog());
        Ok(Self::new(
            engine,
            tools,
            Duration::from_secs(config.server.tool_timeout_secs),
        ))
    }

    /// Mutex serializing cache writes for one session. Created on first use.
    pub fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Forget the session's mutex once a write has finished. Kept while any
    /// other request still holds or awaits it.
    pub fn release_session(&self, session_id: &str) {
        let mut locks = self.locks();
        if locks
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(session_id);
        }
    }

    pub fn tracked_sessions(&self) -> usize {
        self.locks().len()
    }

    fn locks(&self) -> MutexGuard<'_, SessionLocks> {
        self.session_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
