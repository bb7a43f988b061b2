use axum::extract::Path;
use axum::Json;
use serde_json::{json, Value};
use shopper_core::agents::{builtin_agents, find_agent, AgentDefinition};

use crate::error::AppError;
use crate::routes::envelope;

fn summary(agent: &AgentDefinition) -> Value {
    json!({
        "name": agent.name,
        "model": agent.model,
        "description": agent.description,
        "output_key": agent.output_key,
        "output_schema": agent.output_schema(),
        "toolset": agent.toolset,
        "local_tools": agent.local_tools,
    })
}

/// GET /api/agents — built-in agent definitions.
pub async fn list_agents() -> Json<Value> {
    let agents: Vec<Value> = builtin_agents().iter().map(summary).collect();
    envelope(json!({ "agents": agents }))
}

/// GET /api/agents/{name} — one definition including its instruction.
pub async fn get_agent(Path(name): Path<String>) -> Result<Json<Value>, AppError> {
    let agent = find_agent(&name)?;
    let mut detail = summary(&agent);
    detail["instruction"] = json!(agent.instruction);
    Ok(envelope(json!({ "agent": detail })))
}
