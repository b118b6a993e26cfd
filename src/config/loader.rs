//! File loading and merging for mcp-chat configuration.

use anyhow::{Context, Result};
use std::fs;

use super::types::{default_model, Config, McpConfig, ProviderConfig, ProviderEntry};

/// Config written on first run; `{env:VAR}` placeholders are resolved at load time.
fn default_config_toml() -> String {
    format!(
        r#"model = "{model}"
default_provider = "{provider}"
temperature = {temperature}
max_retries = {retries}
max_tool_rounds = {rounds}

[provider]

[provider.ollama]
base_url = "{ollama}"

[provider.anthropic]
api_key = "{{env:ANTHROPIC_API_KEY}}"

[provider.openai]
api_key = "{{env:OPENAI_API_KEY}}"

[provider.openrouter]
api_key = "{{env:OPENROUTER_API_KEY}}"

[mcp]
server_url = "{server}"
auth_token = "{{env:MCP_AUTH_TOKEN}}"
"#,
        model = default_model(),
        provider = crate::constants::DEFAULT_PROVIDER,
        temperature = crate::constants::DEFAULT_TEMPERATURE,
        retries = crate::constants::DEFAULT_MAX_RETRIES,
        rounds = crate::constants::DEFAULT_MAX_TOOL_ROUNDS,
        ollama = crate::constants::OLLAMA_DEFAULT_BASE_URL,
        server = crate::constants::MCP_DEFAULT_SERVER_URL,
    )
}

impl Config {
    /// Loads the global config from `~/.config/mcp-chat/config.toml`.
    ///
    /// If no config file exists, creates one with sensible defaults
    /// (including `{env:VAR}` placeholders for secrets) and returns it.
    pub(super) fn load_global() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let default_toml = default_config_toml();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            let config: Config = toml::from_str(&default_toml)
                .with_context(|| "Failed to parse default config".to_string())?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        Ok(config)
    }

    /// Look for mcp-chat.toml in current dir, then walk up to git root.
    pub(super) fn load_project() -> Result<Option<Config>> {
        let mut dir = std::env::current_dir()?;
        loop {
            let candidate = dir.join(crate::constants::PROJECT_CONFIG_FILENAME);
            if candidate.exists() {
                let contents = fs::read_to_string(&candidate)?;
                let config: Config = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config at {:?}", candidate))?;
                return Ok(Some(config));
            }
            // Stop at git root or filesystem root
            if dir.join(".git").exists() || !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Merge project config over global config.
    /// Project values win when present.
    pub(super) fn merge(global: Config, project: Config) -> Config {
        Config {
            model: if project.model != default_model() {
                project.model
            } else {
                global.model
            },
            default_provider: project.default_provider.or(global.default_provider),
            provider: ProviderConfig {
                ollama: merge_entry(global.provider.ollama, project.provider.ollama),
                anthropic: merge_entry(global.provider.anthropic, project.provider.anthropic),
                openai: merge_entry(global.provider.openai, project.provider.openai),
                openrouter: merge_entry(global.provider.openrouter, project.provider.openrouter),
            },
            system_prompt: if project.system_prompt != crate::constants::DEFAULT_SYSTEM_PROMPT {
                project.system_prompt
            } else {
                global.system_prompt
            },
            temperature: project.temperature.or(global.temperature),
            max_retries: project.max_retries.or(global.max_retries),
            max_tool_rounds: project.max_tool_rounds.or(global.max_tool_rounds),
            mcp: McpConfig {
                server_url: project.mcp.server_url.or(global.mcp.server_url),
                client_name: project.mcp.client_name.or(global.mcp.client_name),
                client_version: project.mcp.client_version.or(global.mcp.client_version),
                auth_token: project.mcp.auth_token.or(global.mcp.auth_token),
                request_timeout_secs: project
                    .mcp
                    .request_timeout_secs
                    .or(global.mcp.request_timeout_secs),
            },
        }
    }
}

/// Field-wise merge of one provider's settings, project over global.
fn merge_entry(
    global: Option<ProviderEntry>,
    project: Option<ProviderEntry>,
) -> Option<ProviderEntry> {
    match (global, project) {
        (Some(global), Some(project)) => Some(ProviderEntry {
            api_key: project.api_key.or(global.api_key),
            base_url: project.base_url.or(global.base_url),
            model: project.model.or(global.model),
        }),
        (global, project) => project.or(global),
    }
}
