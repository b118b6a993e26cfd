//! Environment variable substitution and resolved accessors.

use std::time::Duration;

const REDACTED: &str = "********";

use super::types::{Config, ProviderEntry};

use crate::constants::{
    APP_NAME, APP_VERSION, DEFAULT_MAX_RETRIES, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_TEMPERATURE,
    MCP_DEFAULT_SERVER_URL, MCP_REQUEST_TIMEOUT_SECS, OLLAMA_DEFAULT_BASE_URL,
};

impl Config {
    /// Resolve {env:VAR_NAME} patterns in string fields.
    pub(super) fn resolve_substitutions(&mut self) {
        self.model = Self::resolve_str(&self.model);
        self.system_prompt = Self::resolve_str(&self.system_prompt);
        if let Some(ref mut dp) = self.default_provider {
            *dp = Self::resolve_str(dp);
        }
        Self::resolve_provider_entry(&mut self.provider.ollama);
        Self::resolve_provider_entry(&mut self.provider.anthropic);
        Self::resolve_provider_entry(&mut self.provider.openai);
        Self::resolve_provider_entry(&mut self.provider.openrouter);
        for field in [
            &mut self.mcp.server_url,
            &mut self.mcp.auth_token,
            &mut self.mcp.client_name,
        ] {
            if let Some(value) = field {
                *value = Self::resolve_str(value);
            }
        }
    }

    /// Copy of the config with API keys and the MCP token masked, for display.
    pub fn redacted(&self) -> Config {
        fn mask(secret: &mut Option<String>) {
            if secret.as_deref().is_some_and(|s| !s.is_empty()) {
                *secret = Some(REDACTED.to_string());
            }
        }

        let mut config = self.clone();
        for entry in [
            &mut config.provider.ollama,
            &mut config.provider.anthropic,
            &mut config.provider.openai,
            &mut config.provider.openrouter,
        ]
        .into_iter()
        .flatten()
        {
            mask(&mut entry.api_key);
        }
        mask(&mut config.mcp.auth_token);
        config
    }

    /// Resolves `{env:VAR}` patterns in a single provider entry's `api_key` and `base_url`.
    fn resolve_provider_entry(entry: &mut Option<ProviderEntry>) {
        if let Some(ref mut e) = entry {
            if let Some(ref mut key) = e.api_key {
                *key = Self::resolve_str(key);
            }
            if let Some(ref mut url) = e.base_url {
                *url = Self::resolve_str(url);
            }
        }
    }

    /// Replace {env:VAR} with the environment variable value.
    fn resolve_str(s: &str) -> String {
        let mut result = s.to_string();
        while let Some(start) = result.find("{env:") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 5..start + end];
                let value = std::env::var(var_name).unwrap_or_default();
                result = format!(
                    "{}{}{}",
                    &result[..start],
                    value,
                    &result[start + end + 1..]
                );
            } else {
                break;
            }
        }
        result
    }

    /// Resolve API key for a provider: env var first, then config value.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        let env_key = format!("{}_API_KEY", provider.to_uppercase());
        if let Ok(val) = std::env::var(&env_key) {
            if !val.is_empty() {
                return Some(val);
            }
        }

        self.provider
            .entry(provider)
            .and_then(|e| e.api_key.clone())
            .filter(|key| !key.is_empty())
    }

    /// Get the configured default provider name, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.default_provider.as_deref().filter(|p| !p.is_empty())
    }

    /// Get the model name from config, stripping a provider prefix if present.
    /// Returns None if the model is the compile-time default (meaning user hasn't configured it).
    pub fn model_name(&self) -> Option<String> {
        let m = &self.model;
        if m == crate::constants::DEFAULT_MODEL {
            return None;
        }
        match m.split_once('/') {
            Some((prov, model)) if crate::provider::ProviderKind::parse(prov).is_ok() => {
                Some(model.to_string())
            }
            _ => Some(m.to_string()),
        }
    }

    /// Model configured under `[provider.<name>]`, if any.
    pub fn provider_model(&self, provider: &str) -> Option<String> {
        self.provider.entry(provider).and_then(|e| e.model.clone())
    }

    /// Base URL of the Ollama server.
    pub fn ollama_base_url(&self) -> String {
        self.provider
            .ollama
            .as_ref()
            .and_then(|o| o.base_url.clone())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| OLLAMA_DEFAULT_BASE_URL.to_string())
    }

    /// Sampling temperature for model requests.
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Retries for a failed model request.
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    /// Maximum tool-execution rounds per human turn.
    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS)
    }

    /// SSE endpoint of the MCP server.
    pub fn mcp_server_url(&self) -> String {
        self.mcp
            .server_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| MCP_DEFAULT_SERVER_URL.to_string())
    }

    /// Client name and version reported to the MCP server.
    pub fn mcp_client_info(&self) -> (String, String) {
        (
            self.mcp.client_name.clone().unwrap_or_else(|| APP_NAME.to_string()),
            self.mcp
                .client_version
                .clone()
                .unwrap_or_else(|| APP_VERSION.to_string()),
        )
    }

    /// Bearer token for the MCP server. Empty values (unset env placeholders) count as absent.
    pub fn mcp_auth_token(&self) -> Option<String> {
        self.mcp.auth_token.clone().filter(|t| !t.is_empty())
    }

    /// Timeout for a single MCP request.
    pub fn mcp_request_timeout(&self) -> Duration {
        Duration::from_secs(self.mcp.request_timeout_secs.unwrap_or(MCP_REQUEST_TIMEOUT_SECS))
    }
}
