//! Declarative definitions of the agents deployed to the hosted runtime, and
//! parsing of the structured replies they produce.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, ShopperError};
use crate::prompts;
use crate::tools::{CACHE_TOOL, LOOKUP_TOOL};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const STORE_MCP_URL: &str = "https://ycgraphixs-testing.myshopify.com/api/mcp";

/// Minimum number of follow-up suggestions an advisor reply must carry.
pub const ADVISOR_MIN_SUGGESTIONS: usize = 2;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFormat {
    /// `{ "message": ..., "suggestion": [...] }`
    Shopper,
    /// `{ "message": ..., "suggestions": [...] }` with at least two entries.
    Advisor,
}

/// Remote MCP toolset an agent may call, restricted to `tool_filter`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolsetDefinition {
    pub url: &'static str,
    pub tool_filter: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentDefinition {
    /// Name the runtime records as the author of the agent's events.
    pub name: &'static str,
    /// Deployment package the agent ships in; accepted as an alias.
    pub package: &'static str,
    pub model: &'static str,
    pub description: &'static str,
    pub instruction: &'static str,
    pub reply_format: Option<ReplyFormat>,
    /// Session state key the runtime writes the structured reply under.
    pub output_key: Option<&'static str>,
    pub toolset: Option<ToolsetDefinition>,
    /// Tools served by this backend rather than the store.
    pub local_tools: Vec<&'static str>,
}

impl AgentDefinition {
    pub fn output_schema(&self) -> Option<Value> {
        self.reply_format.map(|f| f.json_schema())
    }
}

pub fn builtin_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition {
            name: "shopify_agent",
            package: "shopify_agent",
            model: DEFAULT_MODEL,
            description: "A personalized shopping agent for Mark's Shopify Store",
            instruction: prompts::SHOPIFY_AGENT_INSTRUCTION,
            reply_format: Some(ReplyFormat::Shopper),
            output_key: Some("shopify_agent_output"),
            toolset: None,
            local_tools: vec![],
        },
        AgentDefinition {
            name: "happy_shopper",
            package: "happy_shopper",
            model: DEFAULT_MODEL,
            description: "A personalized shopping agent for YC Graphixs's Store",
            instruction: prompts::HAPPY_SHOPPER_INSTRUCTION,
            reply_format: None,
            output_key: None,
            toolset: Some(ToolsetDefinition {
                url: STORE_MCP_URL,
                tool_filter: vec!["search_shop_catalog", "get_cart", "update_cart"],
            }),
            local_tools: vec![LOOKUP_TOOL, CACHE_TOOL],
        },
        AgentDefinition {
            name: "shopify_advisor",
            package: "happy_advisor",
            model: DEFAULT_MODEL,
            description: "A personalized advising agent for YC Graphixs's store",
            instruction: prompts::HAPPY_ADVISOR_INSTRUCTION,
            reply_format: Some(ReplyFormat::Advisor),
            output_key: None,
            toolset: None,
            local_tools: vec![],
        },
    ]
}

pub fn find_agent(name: &str) -> Result<AgentDefinition> {
    builtin_agents()
        .into_iter()
        .find(|a| a.name == name || a.package == name)
        .ok_or_else(|| ShopperError::UnknownAgent(name.to_string()))
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopperReply {
    pub message: String,
    #[serde(default)]
    pub suggestion: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorReply {
    pub message: String,
    pub suggestions: Vec<String>,
}

impl ShopperReply {
    pub fn parse(text: &str) -> Result<Self> {
        let reply: Self = parse_reply(text)?;
        if reply.message.trim().is_empty() {
            return Err(ShopperError::InvalidReply("'message' is empty".into()));
        }
        Ok(reply)
    }
}

impl AdvisorReply {
    pub fn parse(text: &str) -> Result<Self> {
        let reply: Self = parse_reply(text)?;
        if reply.suggestions.len() < ADVISOR_MIN_SUGGESTIONS {
            return Err(ShopperError::InvalidReply(format!(
                "expected at least {ADVISOR_MIN_SUGGESTIONS} suggestions, got {}",
                reply.suggestions.len()
            )));
        }
        Ok(reply)
    }
}

impl ReplyFormat {
    pub fn json_schema(self) -> Value {
        match self {
            ReplyFormat::Shopper => json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "The main response from the agent"},
                    "suggestion": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "1-3 suggested prompts based on the conversation context"
                    }
                },
                "required": ["message", "suggestion"]
            }),
            ReplyFormat::Advisor => json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Your response to the user"},
                    "suggestions": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": ADVISOR_MIN_SUGGESTIONS,
                        "description": "User's possible follow-up reply based on your response"
                    }
                },
                "required": ["message", "suggestions"]
            }),
        }
    }

    /// Validate model output against this format and return it as JSON.
    pub fn validate(self, text: &str) -> Result<Value> {
        let value = match self {
            ReplyFormat::Shopper => serde_json::to_value(ShopperReply::parse(text)?)?,
            ReplyFormat::Advisor => serde_json::to_value(AdvisorReply::parse(text)?)?,
        };
        Ok(value)
    }
}

fn parse_reply<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ShopperError::InvalidReply(e.to_string()))
}

/// Models sometimes wrap JSON in a Markdown fence despite instructions.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ---------------------------------------------------------------------------
// ShopperInput
// ---------------------------------------------------------------------------

/// The two-line message format the shopping agent expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopperInput {
    pub cart_id: String,
    pub user_message: String,
}

impl ShopperInput {
    pub fn new(cart_id: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            cart_id: cart_id.into(),
            user_message: user_message.into(),
        }
    }

    pub fn render(&self) -> String {
        // Newlines would break the two-line framing.
        let message = self.user_message.replace(['\r', '\n'], " ");
        format!("cart_id={}\nuser_message={}", self.cart_id, message)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let cart_id = lines
            .next()
            .and_then(|l| l.strip_prefix("cart_id="))
            .ok_or_else(|| ShopperError::InvalidInput("first line must be 'cart_id=<id>'".into()))?;
        let user_message = lines
            .next()
            .and_then(|l| l.strip_prefix("user_message="))
            .ok_or_else(|| {
                ShopperError::InvalidInput("second line must be 'user_message=<text>'".into())
            })?;
        Ok(Self::new(cart_id.trim(), user_message))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
