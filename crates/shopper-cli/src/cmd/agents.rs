use crate::output::{print_json, print_table};
use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use shopper_core::agents::{builtin_agents, find_agent};
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum AgentsSubcommand {
    /// List the built-in agent definitions
    List,
    /// Show one agent, including its instruction and output schema
    Show {
        /// Agent name, e.g. happy_shopper
        name: String,
    },
    /// Check a saved agent reply against the agent's structured reply format
    Validate {
        /// Agent name, e.g. shopify_advisor
        name: String,
        /// File holding the raw reply text
        file: PathBuf,
    },
}

pub fn run(subcommand: AgentsSubcommand, json: bool) -> Result<()> {
    match subcommand {
        AgentsSubcommand::List => list(json),
        AgentsSubcommand::Show { name } => show(&name, json),
        AgentsSubcommand::Validate { name, file } => validate(&name, &file, json),
    }
}

fn list(json: bool) -> Result<()> {
    let agents = builtin_agents();
    if json {
        return print_json(&agents);
    }
    let rows = agents
        .iter()
        .map(|a| {
            let mut tools: Vec<&str> = a
                .toolset
                .as_ref()
                .map(|t| t.tool_filter.clone())
                .unwrap_or_default();
            tools.extend(a.local_tools.iter().copied());
            vec![
                a.name.to_string(),
                a.model.to_string(),
                a.output_key.unwrap_or("-").to_string(),
                if tools.is_empty() { "-".to_string() } else { tools.join(",") },
            ]
        })
        .collect();
    print_table(&["NAME", "MODEL", "OUTPUT KEY", "TOOLS"], rows);
    Ok(())
}

fn show(name: &str, json: bool) -> Result<()> {
    let agent = find_agent(name)?;
    if json {
        return print_json(&serde_json::json!({
            "agent": agent,
            "output_schema": agent.output_schema(),
        }));
    }

    println!("{}  ({})", agent.name, agent.model);
    println!("{}", agent.description);
    if let Some(key) = agent.output_key {
        println!("output key: {key}");
    }
    if let Some(toolset) = &agent.toolset {
        println!("toolset:    {} [{}]", toolset.url, toolset.tool_filter.join(", "));
    }
    if !agent.local_tools.is_empty() {
        println!("local tools: {}", agent.local_tools.join(", "));
    }
    if let Some(schema) = agent.output_schema() {
        println!("\noutput schema:\n{}", serde_json::to_string_pretty(&schema)?);
    }
    println!("\ninstruction:\n{}", agent.instruction.trim());
    Ok(())
}

fn validate(name: &str, file: &Path, json: bool) -> Result<()> {
    let agent = find_agent(name)?;
    let format = agent
        .reply_format
        .ok_or_else(|| anyhow!("agent '{name}' has no structured reply format"))?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let reply = format.validate(&text)?;
    if json {
        return print_json(&reply);
    }

    println!("valid {} reply", agent.name);
    println!("message: {}", reply["message"].as_str().unwrap_or_default());
    let suggestions = reply
        .get("suggestions")
        .or_else(|| reply.get("suggestion"))
        .and_then(|s| s.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    for suggestion in suggestions {
        println!("  - {}", suggestion.as_str().unwrap_or_default());
    }
    Ok(())
}
