//! Struct definitions and serde defaults for mcp-chat configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for mcp-chat, deserialized from `config.toml`.
///
/// Fields use serde defaults so mcp-chat can run with sensible defaults
/// when no config file exists.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Default model identifier (e.g. `"llama3.2:3b-instruct-q8_0"`).
    #[serde(default = "default_model")]
    pub model: String,
    /// Default provider name (e.g., "ollama", "anthropic").
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Per-provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// System instruction rendered ahead of every model call.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Sampling temperature passed to the model.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Retries for a failed model request.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Maximum tool-execution rounds per human turn.
    #[serde(default)]
    pub max_tool_rounds: Option<usize>,
    /// MCP tool server connection.
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Returns the default model identifier.
///
/// Used by serde's `#[serde(default)]` attribute during deserialization.
pub(super) fn default_model() -> String {
    crate::constants::DEFAULT_MODEL.to_string()
}

/// Returns the default system instruction.
fn default_system_prompt() -> String {
    crate::constants::DEFAULT_SYSTEM_PROMPT.to_string()
}

/// Provider-specific configuration map.
///
/// Each field corresponds to a supported LLM provider. Only providers
/// the user has configured will be `Some`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderConfig {
    /// Configuration for the local Ollama provider.
    pub ollama: Option<ProviderEntry>,
    /// Configuration for the Anthropic API provider.
    pub anthropic: Option<ProviderEntry>,
    /// Configuration for the OpenAI API provider.
    pub openai: Option<ProviderEntry>,
    /// Configuration for the OpenRouter API provider.
    pub openrouter: Option<ProviderEntry>,
}

impl ProviderConfig {
    pub(super) fn entry(&self, provider: &str) -> Option<&ProviderEntry> {
        match provider {
            "ollama" => self.ollama.as_ref(),
            "anthropic" => self.anthropic.as_ref(),
            "openai" => self.openai.as_ref(),
            "openrouter" => self.openrouter.as_ref(),
            _ => None,
        }
    }
}

/// Connection details for a single LLM provider.
///
/// Allows overriding the API key, endpoint URL, and model on a
/// per-provider basis.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderEntry {
    /// API key for authentication. Can also be set via environment variables.
    pub api_key: Option<String>,
    /// Custom base URL for the provider's API.
    pub base_url: Option<String>,
    /// Model identifier to use with this provider, overriding the global default.
    pub model: Option<String>,
}

/// Connection settings for the MCP tool server.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct McpConfig {
    /// SSE endpoint of the server (e.g. `http://localhost:7000/sse`).
    pub server_url: Option<String>,
    /// Client name reported in the `initialize` handshake.
    pub client_name: Option<String>,
    /// Client version reported in the `initialize` handshake.
    pub client_version: Option<String>,
    /// Bearer token sent with every request, if the server requires one.
    pub auth_token: Option<String>,
    /// Timeout for a single request, in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            default_provider: None,
            provider: ProviderConfig::default(),
            system_prompt: default_system_prompt(),
            temperature: None,
            max_retries: None,
            max_tool_rounds: None,
            mcp: McpConfig::default(),
        }
    }
}
