//! LLM provider abstraction for mcp-chat.
//!
//! The agent loop only sees the [`ModelBackend`] trait: hand it the rendered
//! transcript and the tool definitions, get back one [`ModelResponse`]. The
//! production backend, [`Provider`], wraps rig-core's provider clients behind
//! enum dispatch and supports Ollama (default), Anthropic, OpenAI and
//! OpenRouter via [`ProviderKind`].

mod client;
mod kind;
mod resolve;

pub use client::Provider;
pub use kind::{default_model_for, ProviderKind};
pub use resolve::{resolve_model, ModelSelection};

use async_trait::async_trait;
use thiserror::Error;

use crate::output::Renderer;
use crate::tools::ToolDefinition;
use crate::transcript::{ToolCallRequest, Turn};

/// One complete model reply: the accumulated text plus any tool requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

#[cfg(test)]
impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
        }
    }
}

/// The model backend call failed.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed after {attempts} attempt(s): {message}")]
    Request { attempts: u32, message: String },
    #[error("nothing to send: the transcript has no turns after the system instruction")]
    EmptyPrompt,
}

/// A language-model inference service.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Sends the rendered transcript and returns the model's complete reply.
    ///
    /// Text tokens are forwarded to `renderer` as they arrive when the
    /// backend streams; the returned response always holds the full text.
    async fn invoke(
        &self,
        messages: &[&Turn],
        tools: &[ToolDefinition],
        renderer: &mut dyn Renderer,
    ) -> Result<ModelResponse, ModelError>;
}
