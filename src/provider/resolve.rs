//! Model resolution logic for mcp-chat.
//!
//! Resolves which provider and model to use based on CLI flags, config file,
//! and hardcoded defaults. Supports `provider/model` shorthand syntax.

use anyhow::Result;

use super::kind::{default_model_for, ProviderKind};
use crate::config::Config;
use crate::constants::DEFAULT_PROVIDER;

/// Resolved provider + model pair.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub provider: ProviderKind,
    pub model: String,
}

/// Resolve which provider and model to use.
/// Priority: CLI flags > config.toml > defaults.
///
/// Accepts these formats:
///   --model ollama/llama3.2  (provider/model shorthand, only when --provider is omitted
///                             and the prefix names a known provider)
///   --provider openrouter --model "org/model-name"  (slash preserved as model name)
///   --provider anthropic  (uses the provider's configured or default model)
///   (nothing)  (uses config.toml, then hardcoded default)
pub fn resolve_model(
    cli_provider: Option<&str>,
    cli_model: Option<&str>,
    config: &Config,
) -> Result<ModelSelection> {
    if cli_provider.is_none() {
        if let Some((prov, model)) = cli_model.and_then(|m| m.split_once('/')) {
            if let Ok(provider) = ProviderKind::parse(prov) {
                return Ok(ModelSelection {
                    provider,
                    model: model.to_string(),
                });
            }
        }
    }

    let provider_str = cli_provider
        .or(config.provider_name())
        .unwrap_or(DEFAULT_PROVIDER);
    let provider = ProviderKind::parse(provider_str)?;

    let model = cli_model
        .map(String::from)
        .or_else(|| config.provider_model(provider.name()))
        .or_else(|| config.model_name())
        .unwrap_or_else(|| default_model_for(&provider).to_string());

    Ok(ModelSelection { provider, model })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_ollama() {
        let selection = resolve_model(None, None, &Config::default()).unwrap();
        assert_eq!(selection.provider, ProviderKind::Ollama);
        assert_eq!(selection.model, crate::constants::DEFAULT_MODEL);
    }

    #[test]
    fn test_shorthand_with_known_provider() {
        let selection =
            resolve_model(None, Some("anthropic/claude-sonnet-4-5"), &Config::default()).unwrap();
        assert_eq!(selection.provider, ProviderKind::Anthropic);
        assert_eq!(selection.model, "claude-sonnet-4-5");
    }

    #[test]
    fn test_slash_kept_when_prefix_is_not_a_provider() {
        let selection = resolve_model(None, Some("library/qwen2.5"), &Config::default()).unwrap();
        assert_eq!(selection.provider, ProviderKind::Ollama);
        assert_eq!(selection.model, "library/qwen2.5");
    }

    #[test]
    fn test_explicit_provider_uses_its_default_model() {
        let selection = resolve_model(Some("openai"), None, &Config::default()).unwrap();
        assert_eq!(selection.provider, ProviderKind::OpenAI);
        assert_eq!(selection.model, crate::constants::DEFAULT_OPENAI_MODEL);
    }

    #[test]
    fn test_unknown_provider_errors() {
        assert!(resolve_model(Some("nope"), None, &Config::default()).is_err());
    }
}
