//! The remote tool source seam.
//!
//! [`ToolSource`] is what the registry talks to: list the advertised tools
//! once, then call them by name. The MCP client in [`crate::mcp`] is the
//! production implementation; tests use scripted fakes.

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use serde_json::Value;
use thiserror::Error;

use super::ToolDescriptor;

/// Failure talking to the tool source.
#[derive(Debug, Error)]
pub enum ToolSourceError {
    /// The server rejected our credentials (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("connection failed: {0}")]
    Connection(String),
    /// The server answered with a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("request `{method}` timed out after {secs}s")]
    Timeout { method: String, secs: u64 },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection to tool server closed")]
    Closed,
}

impl ToolSourceError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

/// Flattens the content items of a `tools/call` result into one string.
///
/// Text items contribute their `text`; any other item (images, embedded
/// resources) is rendered as compact JSON.
pub fn result_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .map(|item| {
            let item = serde_json::to_value(item).unwrap_or_default();
            match (item.get("type").and_then(Value::as_str), item.get("text")) {
                (Some("text"), Some(Value::String(text))) => text.clone(),
                _ => item.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A remote host that advertises tools and executes them on request.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Fetch every tool the source advertises, in one round trip.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolSourceError>;

    /// Execute the named tool with already-validated arguments.
    async fn call_tool(&self, name: &str, args: Value) -> Result<CallToolResult, ToolSourceError>;
}
