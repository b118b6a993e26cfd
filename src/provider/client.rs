//! rig-core backed [`ModelBackend`] implementation.
//!
//! Contains the [`Provider`] struct which wraps rig-core provider clients
//! behind enum dispatch. Each [`ModelBackend::invoke`] issues exactly one
//! streaming completion request; tool execution stays with the agent loop.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use rig::client::CompletionClient;
use rig::completion::{CompletionError, CompletionModel, ToolDefinition as RigToolDefinition};
use rig::message::{
    AssistantContent, Message as RigMessage, Text, ToolCall as RigToolCall, ToolFunction,
};
use rig::providers::{anthropic, openai, openrouter};
use rig::streaming::StreamedAssistantContent;
use rig::OneOrMany;
use std::time::Duration;

use super::kind::ProviderKind;
use super::resolve::ModelSelection;
use super::{ModelBackend, ModelError, ModelResponse};
use crate::config::Config;
use crate::constants::{MAX_TOKENS, RETRY_BACKOFF_MS};
use crate::output::Renderer;
use crate::tools::{ToolDefinition, ToolStatus};
use crate::transcript::{ToolCallRequest, Turn};

/// Internal enum wrapping provider-specific clients.
enum ClientKind {
    Anthropic(anthropic::Client),
    OpenAI(openai::Client),
    OpenRouter(openrouter::Client),
    Ollama(openai::Client),
}

/// A configured LLM provider ready to handle completion requests.
///
/// Model id, temperature and retry count are passed through to every request
/// as configured; they are not validated here.
pub struct Provider {
    client: ClientKind,
    model: String,
    temperature: f64,
    max_retries: u32,
}

/// Dispatches an operation across provider-specific clients.
///
/// Matches on [`ClientKind`] and executes the same block for each variant,
/// letting the compiler monomorphize per provider.
macro_rules! dispatch {
    ($self:expr, |$client:ident| $body:expr) => {
        match &$self.client {
            ClientKind::Anthropic($client) => $body,
            ClientKind::OpenAI($client) => $body,
            ClientKind::OpenRouter($client) => $body,
            ClientKind::Ollama($client) => $body,
        }
    };
}

/// A transcript converted into the pieces of a rig completion request.
struct RequestParts {
    preamble: Option<String>,
    history: Vec<RigMessage>,
    prompt: RigMessage,
    tools: Vec<RigToolDefinition>,
}

impl Provider {
    /// Creates a new [`Provider`] from the loaded application config.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is found for a hosted provider or if
    /// client construction fails.
    pub fn from_config(config: &Config, selection: &ModelSelection) -> Result<Self> {
        let client = match selection.provider {
            ProviderKind::Anthropic => {
                let api_key = config
                    .resolve_api_key("anthropic")
                    .context("No API key found for Anthropic. Set ANTHROPIC_API_KEY or configure it in config.toml")?;
                ClientKind::Anthropic(
                    anthropic::Client::new(&api_key).context("Failed to create Anthropic client")?,
                )
            }
            ProviderKind::OpenAI => {
                let api_key = config
                    .resolve_api_key("openai")
                    .context("No API key found for OpenAI. Set OPENAI_API_KEY or configure it in config.toml")?;
                ClientKind::OpenAI(
                    openai::Client::new(&api_key).context("Failed to create OpenAI client")?,
                )
            }
            ProviderKind::OpenRouter => {
                let api_key = config
                    .resolve_api_key("openrouter")
                    .context("No API key found for OpenRouter. Set OPENROUTER_API_KEY or configure it in config.toml")?;
                ClientKind::OpenRouter(
                    openrouter::Client::new(&api_key).context("Failed to create OpenRouter client")?,
                )
            }
            ProviderKind::Ollama => {
                let base_url = config.ollama_base_url();
                let client = openai::Client::builder()
                    .api_key("ollama")
                    .base_url(format!("{}/v1", base_url.trim_end_matches('/')))
                    .build()
                    .context("Failed to create Ollama client")?;
                ClientKind::Ollama(client)
            }
        };

        Ok(Self {
            client,
            model: selection.model.clone(),
            temperature: config.temperature(),
            max_retries: config.max_retries(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one streaming completion request and accumulates the reply.
    ///
    /// `streamed` is set once any text reached the renderer, so the caller
    /// knows a retry would duplicate visible output.
    async fn stream_once<M: CompletionModel>(
        &self,
        model: M,
        parts: &RequestParts,
        renderer: &mut dyn Renderer,
        streamed: &mut bool,
    ) -> Result<ModelResponse, CompletionError> {
        let mut builder = model
            .completion_request(parts.prompt.clone())
            .messages(parts.history.clone())
            .tools(parts.tools.clone())
            .temperature(self.temperature)
            .max_tokens(MAX_TOKENS);
        if let Some(preamble) = &parts.preamble {
            builder = builder.preamble(preamble.clone());
        }

        let mut stream = builder.stream().await?;
        let mut response = ModelResponse::default();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamedAssistantContent::Text(Text { text }) => {
                    renderer.render_token(&text);
                    *streamed = true;
                    response.text.push_str(&text);
                }
                StreamedAssistantContent::ToolCall { tool_call, .. } => {
                    response.tool_calls.push(convert_tool_call(tool_call));
                }
                _ => {
                    // Deltas, reasoning and the final usage record carry nothing we keep
                }
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelBackend for Provider {
    async fn invoke(
        &self,
        messages: &[&Turn],
        tools: &[ToolDefinition],
        renderer: &mut dyn Renderer,
    ) -> Result<ModelResponse, ModelError> {
        let parts = build_request(messages, tools)?;
        let mut retry = Retry::new(self.max_retries);

        loop {
            let mut streamed = false;
            let result = dispatch!(self, |client| {
                let model = client.completion_model(self.model.as_str());
                self.stream_once(model, &parts, renderer, &mut streamed).await
            });

            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            match retry.failed(streamed) {
                Some(delay) => {
                    tracing::warn!(attempt = retry.attempts(), error = %err, "model request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(ModelError::Request {
                        attempts: retry.attempts(),
                        message: err.to_string(),
                    })
                }
            }
        }
    }
}

/// Retry bookkeeping for one model invocation.
///
/// A failed attempt is retried with linear backoff while retries remain,
/// unless output was already streamed to the user.
#[derive(Debug)]
struct Retry {
    max_retries: u32,
    attempts: u32,
}

impl Retry {
    fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            attempts: 0,
        }
    }

    /// Records a failed attempt and returns the delay before the next one,
    /// or `None` when the failure is final.
    fn failed(&mut self, streamed: bool) -> Option<Duration> {
        self.attempts += 1;
        if streamed || self.attempts > self.max_retries {
            return None;
        }
        Some(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(self.attempts)))
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Splits rendered turns into preamble, history and the trailing prompt message.
fn build_request(messages: &[&Turn], tools: &[ToolDefinition]) -> Result<RequestParts, ModelError> {
    let preamble = messages.iter().find_map(|turn| match turn {
        Turn::SystemInstruction { text } => Some(text.clone()),
        _ => None,
    });

    let mut history: Vec<RigMessage> = messages.iter().filter_map(|t| convert_turn_to_rig(t)).collect();
    let prompt = history.pop().ok_or(ModelError::EmptyPrompt)?;

    let tools = tools
        .iter()
        .map(|t| RigToolDefinition {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: t.parameters.clone(),
        })
        .collect();

    Ok(RequestParts {
        preamble,
        history,
        prompt,
        tools,
    })
}

/// Converts a rig tool call into a [`ToolCallRequest`].
///
/// Some local models omit the call id; a fresh one is generated so the
/// outcome can still be paired with its request.
fn convert_tool_call(tool_call: RigToolCall) -> ToolCallRequest {
    let id = if tool_call.id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        tool_call.id
    };
    ToolCallRequest {
        id,
        name: tool_call.function.name,
        args: tool_call.function.arguments,
    }
}

/// Converts a transcript [`Turn`] to a rig-core [`RigMessage`].
///
/// - **HumanInput** → `RigMessage::User` with text content
/// - **ModelResponse** (text only) → `RigMessage::Assistant` with text content
/// - **ModelResponse** (with tool calls) → `RigMessage::Assistant` with `ToolCall` content items
/// - **ToolOutcome** → tool result message keyed by the correlation id
/// - **SystemInstruction** → `None` (sent as the preamble instead)
fn convert_turn_to_rig(turn: &Turn) -> Option<RigMessage> {
    match turn {
        Turn::HumanInput { text } => Some(RigMessage::user(text.clone())),
        Turn::ModelResponse { text, tool_calls } if tool_calls.is_empty() => {
            Some(RigMessage::assistant(text.clone()))
        }
        Turn::ModelResponse { text, tool_calls } => {
            let mut items: Vec<AssistantContent> = Vec::new();
            if !text.is_empty() {
                items.push(AssistantContent::Text(Text { text: text.clone() }));
            }
            for call in tool_calls {
                items.push(AssistantContent::ToolCall(RigToolCall::new(
                    call.id.clone(),
                    ToolFunction::new(call.name.clone(), call.args.clone()),
                )));
            }
            Some(RigMessage::Assistant {
                id: None,
                content: OneOrMany::many(items)
                    .unwrap_or_else(|_| OneOrMany::one(AssistantContent::text(""))),
            })
        }
        Turn::ToolOutcome { result } => {
            let content = match result.status {
                ToolStatus::Success => result.content.clone(),
                ToolStatus::Error => format!("Error: {}", result.content),
            };
            Some(RigMessage::tool_result(result.correlation_id.clone(), content))
        }
        Turn::SystemInstruction { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolResult;
    use serde_json::json;

    /// Feeds `Retry` a run of failures, each flagged with whether it had
    /// streamed, and returns the delays granted plus the final attempt count.
    fn run_failures(max_retries: u32, streamed: &[bool]) -> (Vec<Duration>, u32, bool) {
        let mut retry = Retry::new(max_retries);
        let mut delays = Vec::new();
        for &flag in streamed {
            match retry.failed(flag) {
                Some(delay) => delays.push(delay),
                None => return (delays, retry.attempts(), true),
            }
        }
        (delays, retry.attempts(), false)
    }

    #[test]
    fn test_retries_failures_before_the_first_token() {
        let (delays, attempts, gave_up) = run_failures(2, &[false, false]);
        assert!(!gave_up);
        assert_eq!(attempts, 2);
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(RETRY_BACKOFF_MS),
                Duration::from_millis(RETRY_BACKOFF_MS * 2)
            ]
        );
    }

    #[test]
    fn test_no_retry_after_streaming() {
        let (delays, attempts, gave_up) = run_failures(5, &[true]);
        assert!(gave_up);
        assert!(delays.is_empty());
        assert_eq!(attempts, 1);

        let (delays, attempts, gave_up) = run_failures(5, &[false, true]);
        assert!(gave_up);
        assert_eq!(delays.len(), 1);
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_gives_up_after_max_retries_plus_one_attempts() {
        let (delays, attempts, gave_up) = run_failures(2, &[false; 10]);
        assert!(gave_up);
        assert_eq!(delays.len(), 2);
        assert_eq!(attempts, 3);

        let (delays, attempts, gave_up) = run_failures(0, &[false; 10]);
        assert!(gave_up);
        assert!(delays.is_empty());
        assert_eq!(attempts, 1);
    }

    fn transcript() -> Vec<Turn> {
        vec![
            Turn::SystemInstruction {
                text: "use tools".to_string(),
            },
            Turn::human("list my directories"),
            Turn::model(
                "",
                vec![ToolCallRequest {
                    id: "abc".to_string(),
                    name: "list_allowed_directories".to_string(),
                    args: json!({}),
                }],
            ),
            Turn::outcome(ToolResult::success("abc", "Allowed directories:\n/home/user/Projects")),
        ]
    }

    #[test]
    fn test_build_request_splits_preamble_history_prompt() {
        let turns = transcript();
        let rendered: Vec<&Turn> = turns.iter().collect();
        let defs = vec![ToolDefinition {
            name: "list_allowed_directories".to_string(),
            description: "lists".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }];

        let parts = build_request(&rendered, &defs).unwrap();
        assert_eq!(parts.preamble.as_deref(), Some("use tools"));
        // human input + assistant tool call; the tool result is the prompt
        assert_eq!(parts.history.len(), 2);
        assert!(matches!(parts.prompt, RigMessage::User { .. }));
        assert_eq!(parts.tools.len(), 1);
        assert_eq!(parts.tools[0].name, "list_allowed_directories");
    }

    #[test]
    fn test_system_only_transcript_is_rejected() {
        let system = Turn::SystemInstruction {
            text: "sys".to_string(),
        };
        let err = match build_request(&[&system], &[]) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, ModelError::EmptyPrompt));
    }

    #[test]
    fn test_tool_call_turn_converts_to_assistant_content() {
        let turns = transcript();
        match convert_turn_to_rig(&turns[2]) {
            Some(RigMessage::Assistant { content, .. }) => {
                let items: Vec<AssistantContent> = content.into_iter().collect();
                assert_eq!(items.len(), 1);
                match &items[0] {
                    AssistantContent::ToolCall(call) => {
                        assert_eq!(call.id, "abc");
                        assert_eq!(call.function.name, "list_allowed_directories");
                    }
                    _ => panic!("expected a tool call"),
                }
            }
            _ => panic!("expected an assistant message"),
        }
        assert!(convert_turn_to_rig(&turns[0]).is_none());
    }

    #[test]
    fn test_missing_tool_call_id_is_generated() {
        let call = RigToolCall::new(
            String::new(),
            ToolFunction::new("add".to_string(), json!({"a": 1})),
        );
        let request = convert_tool_call(call);
        assert!(!request.id.is_empty());
        assert_eq!(request.name, "add");
        assert_eq!(request.args, json!({"a": 1}));
    }
}
