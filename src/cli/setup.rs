//! Startup plumbing shared by the subcommands: config overrides, the MCP
//! connection and agent assembly.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use super::GlobalArgs;
use crate::agent::Agent;
use crate::config::Config;
use crate::mcp::{McpClient, McpSettings};
use crate::provider::{ModelSelection, Provider};
use crate::tools::ToolRegistry;

/// Loads the config files and applies command-line overrides on top.
pub(crate) fn load_config(args: &GlobalArgs) -> Result<Config> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut Config, args: &GlobalArgs) {
    if let Some(url) = &args.server {
        config.mcp.server_url = Some(url.clone());
    }
    if let Some(rounds) = args.max_rounds {
        config.max_tool_rounds = Some(rounds);
    }
}

/// Connects to the MCP server and discovers its tools.
///
/// Rejected credentials and unreachable servers abort with different
/// messages so the user knows which setting to fix.
pub(crate) async fn connect_tools(config: &Config) -> Result<ToolRegistry> {
    let settings = McpSettings::from_config(config);
    let url = settings.server_url.clone();
    println!("{} connecting to {}", "[mcp]".cyan(), url.dimmed());

    let client = match McpClient::connect(&settings).await {
        Ok(client) => client,
        Err(e) if e.is_authentication() => anyhow::bail!(
            "the MCP server at {url} rejected our credentials ({e}); check [mcp].auth_token"
        ),
        Err(e) => anyhow::bail!("could not connect to the MCP server at {url}: {e}"),
    };
    println!(
        "{} connected to {}",
        "[mcp]".cyan(),
        client.server_label().bold()
    );

    let registry = ToolRegistry::discover(Arc::new(client))
        .await
        .context("tool discovery failed")?;
    println!("{} {} tools available", "[mcp]".cyan(), registry.len());
    println!();
    Ok(registry)
}

/// Builds the model backend and wraps everything in an [`Agent`].
pub(crate) fn build_agent(
    config: &Config,
    selection: &ModelSelection,
    registry: ToolRegistry,
) -> Result<Agent> {
    let provider = Provider::from_config(config, selection)?;
    tracing::debug!(provider = %selection.provider, model = %provider.model(), "model backend ready");
    Ok(Agent::new(
        Box::new(provider),
        registry,
        config.system_prompt.clone(),
        config.max_tool_rounds(),
    ))
}

/// Prints each tool with its arguments.
pub(crate) fn print_tools(registry: &ToolRegistry) {
    if registry.is_empty() {
        println!("{}", "No tools offered.".dimmed());
        return;
    }
    for tool in registry.tools() {
        println!("{}", tool.name().bold());
        println!("  {}", tool.description().dimmed());
        for field in tool.validator().fields() {
            let required = if field.required { "" } else { " (optional)" };
            println!("  - {}: {}{}", field.name, field.kind, required.dimmed());
        }
    }
}
