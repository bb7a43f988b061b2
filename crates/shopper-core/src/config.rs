use crate::catalog::{StorefrontCatalog, UnconfiguredCatalog, VariantCatalog};
use crate::error::{Result, ShopperError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Upper bound on one cache update, catalog calls included.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    /// A session cache untouched for this long is discarded.
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,
}

fn default_port() -> u16 {
    8000
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_session_idle() -> u64 {
    crate::session::DEFAULT_SESSION_IDLE.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            allowed_origins: Vec::new(),
            tool_timeout_secs: default_tool_timeout(),
            session_idle_secs: default_session_idle(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentEngineConfig
// ---------------------------------------------------------------------------

/// Location of the hosted reasoning engine that runs the agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEngineConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Override for the REST host, e.g. a local emulator.
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// The three identifiers every engine request needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCoordinates {
    pub project_id: String,
    pub location: String,
    pub resource_id: String,
}

impl AgentEngineConfig {
    pub fn coordinates(&self) -> Result<EngineCoordinates> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("PROJECT_ID", &self.project_id),
            ("LOCATION", &self.location),
            ("RESOURCE_ID", &self.resource_id),
        ] {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(ShopperError::MissingConfig(missing.join(", ")));
        }
        Ok(EngineCoordinates {
            project_id: self.project_id.clone().unwrap_or_default(),
            location: self.location.clone().unwrap_or_default(),
            resource_id: self.resource_id.clone().unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// StorefrontConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// Storefront GraphQL endpoint used to expand availability matrices.
    #[serde(default)]
    pub graphql_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

fn default_catalog_timeout() -> u64 {
    10
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            graphql_url: None,
            access_token: None,
            timeout_secs: default_catalog_timeout(),
        }
    }
}

impl StorefrontConfig {
    /// Catalog for matrix expansion; without an endpoint every expansion fails.
    pub fn catalog(&self) -> Arc<dyn VariantCatalog> {
        match &self.graphql_url {
            Some(url) => Arc::new(StorefrontCatalog::new(
                url.clone(),
                self.access_token.clone(),
                Duration::from_secs(self.timeout_secs),
            )),
            None => Arc::new(UnconfiguredCatalog),
        }
    }
}

// ---------------------------------------------------------------------------
// ShopperConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShopperConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent_engine: AgentEngineConfig,
    #[serde(default)]
    pub storefront: StorefrontConfig,
}

impl ShopperConfig {
    /// Read the optional YAML file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_yaml(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overlay values from environment-style lookups. Unset or empty
    /// variables leave the current value alone.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.server.port = parse_number("PORT", &port)?;
        }
        if let Some(origins) = get("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(secs) = get("TOOL_TIMEOUT_SECS") {
            self.server.tool_timeout_secs = parse_number("TOOL_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = get("SESSION_IDLE_SECS") {
            self.server.session_idle_secs = parse_number("SESSION_IDLE_SECS", &secs)?;
        }

        let engine = &mut self.agent_engine;
        for (key, slot) in [
            ("PROJECT_ID", &mut engine.project_id),
            ("LOCATION", &mut engine.location),
            ("RESOURCE_ID", &mut engine.resource_id),
            ("AGENT_ENGINE_API_BASE", &mut engine.api_base),
            ("AGENT_ENGINE_TOKEN", &mut engine.access_token),
        ] {
            if let Some(v) = get(key) {
                *slot = Some(v);
            }
        }

        if let Some(url) = get("STOREFRONT_GRAPHQL_URL") {
            self.storefront.graphql_url = Some(url);
        }
        if let Some(token) = get("STOREFRONT_ACCESS_TOKEN") {
            self.storefront.access_token = Some(token);
        }
        if let Some(secs) = get("CATALOG_TIMEOUT_SECS") {
            self.storefront.timeout_secs = parse_number("CATALOG_TIMEOUT_SECS", &secs)?;
        }
        Ok(())
    }

    /// Startup check: the engine coordinates are mandatory.
    pub fn validate(&self) -> Result<()> {
        self.agent_engine.coordinates().map(|_| ())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ShopperError::InvalidConfig {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
