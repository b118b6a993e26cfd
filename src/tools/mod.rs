//! Registry of tools discovered from a remote [`ToolSource`].
//!
//! Discovery fetches the advertised [`ToolDescriptor`]s once, translates each
//! input schema into a [`Validator`], and indexes the resulting
//! [`CallableTool`]s by name so the agent loop can dispatch model tool calls
//! with a single lookup.

mod source;

pub use rmcp::model::CallToolResult;
pub use source::{result_text, ToolSource, ToolSourceError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::schema::{self, SchemaError, Validator};

/// Definition of a tool as advertised by the tool source (`tools/list`).
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Whether a tool call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// The result of executing (or refusing to execute) a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    /// Echoes the id of the tool call request this result answers.
    pub correlation_id: String,
    pub status: ToolStatus,
}

impl ToolResult {
    pub fn success(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            correlation_id: correlation_id.into(),
            status: ToolStatus::Success,
        }
    }

    pub fn error(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            correlation_id: correlation_id.into(),
            status: ToolStatus::Error,
        }
    }

    /// Result for a call naming a tool the registry does not hold.
    pub fn not_found(correlation_id: impl Into<String>, tool_name: &str) -> Self {
        Self::error(correlation_id, format!("No such tool \"{tool_name}\" exists."))
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }
}

/// Per-invocation context supplied by the caller.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Id of the model's tool call request, copied onto the result.
    pub correlation_id: String,
}

impl CallContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
        }
    }
}

/// Definition sent to the LLM so it knows what tools are available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
}

/// A discovered tool, ready to be invoked with model-supplied arguments.
pub struct CallableTool {
    descriptor: ToolDescriptor,
    validator: Validator,
    source: Arc<dyn ToolSource>,
}

impl CallableTool {
    /// Builds a callable tool, translating the descriptor's input schema.
    pub fn new(descriptor: ToolDescriptor, source: Arc<dyn ToolSource>) -> Result<Self, SchemaError> {
        let validator = schema::translate(&descriptor.input_schema)?;
        Ok(Self {
            descriptor,
            validator,
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Description for the LLM, falling back to a generic one.
    pub fn description(&self) -> String {
        self.descriptor
            .description
            .clone()
            .unwrap_or_else(|| format!("Tool for {}", self.descriptor.name))
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.descriptor.name.clone(),
            description: self.description(),
            parameters: self.descriptor.input_schema.clone(),
        }
    }

    /// Validates `args` and executes the tool on the remote source.
    ///
    /// Never fails: invalid arguments and remote failures come back as an
    /// error [`ToolResult`] so the model can see them and react.
    pub async fn invoke(&self, args: &Value, ctx: &CallContext) -> ToolResult {
        let args = match self.validator.validate(args) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(
                    tool = %self.name(),
                    field = e.field().unwrap_or("-"),
                    error = %e,
                    "rejected tool arguments"
                );
                return ToolResult::error(
                    ctx.correlation_id.clone(),
                    format!("Invalid arguments for tool \"{}\": {}", self.name(), e),
                );
            }
        };

        match self.source.call_tool(self.name(), Value::Object(args)).await {
            Ok(raw) => {
                tracing::debug!(
                    tool = %self.name(),
                    response = %serde_json::to_string(&raw).unwrap_or_default(),
                    "tool response"
                );
                let content = result_text(&raw);
                if raw.is_error.unwrap_or(false) {
                    ToolResult::error(ctx.correlation_id.clone(), content)
                } else {
                    ToolResult::success(ctx.correlation_id.clone(), content)
                }
            }
            Err(e) => {
                tracing::warn!(tool = %self.name(), error = %e, "tool call failed");
                ToolResult::error(
                    ctx.correlation_id.clone(),
                    format!("Tool \"{}\" failed: {}", self.name(), e),
                )
            }
        }
    }
}

/// Discovery failed; no tools were registered.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to list tools: {0}")]
    Source(#[from] ToolSourceError),
    #[error("tool `{tool}` has an invalid input schema: {source}")]
    Schema {
        tool: String,
        #[source]
        source: SchemaError,
    },
}

/// Holds all discovered tools and dispatches calls by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, CallableTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists the source's tools and builds a registry from them.
    ///
    /// # Errors
    ///
    /// Fails if the listing fails or any descriptor's schema is invalid; a
    /// partially registered tool set is never returned.
    pub async fn discover(source: Arc<dyn ToolSource>) -> Result<Self, RegistryError> {
        let descriptors = source.list_tools().await?;
        Self::from_descriptors(source, descriptors)
    }

    /// Builds a registry from already-fetched descriptors.
    ///
    /// Descriptors sharing a name overwrite earlier ones.
    pub fn from_descriptors(
        source: Arc<dyn ToolSource>,
        descriptors: Vec<ToolDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            let tool = CallableTool::new(descriptor, Arc::clone(&source)).map_err(|err| {
                RegistryError::Schema {
                    tool: name.clone(),
                    source: err,
                }
            })?;
            registry.register(tool);
        }
        Ok(registry)
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: CallableTool) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "duplicate tool name, keeping the last definition");
        }
    }

    pub fn get(&self, name: &str) -> Option<&CallableTool> {
        self.tools.get(name)
    }

    /// Tools sorted by name, for stable listings.
    pub fn tools(&self) -> Vec<&CallableTool> {
        let mut tools: Vec<&CallableTool> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// Produce definitions for the LLM (sent in the API request).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools().into_iter().map(CallableTool::definition).collect()
    }

    /// Look up a tool by name and execute it.
    ///
    /// Unknown names produce an error result carrying the requested name.
    pub async fn execute(&self, name: &str, args: &Value, ctx: &CallContext) -> ToolResult {
        match self.get(name) {
            Some(tool) => tool.invoke(args, ctx).await,
            None => {
                tracing::warn!(tool = %name, "model requested an unknown tool");
                ToolResult::not_found(ctx.correlation_id.clone(), name)
            }
        }
    }

    /// How many tools are registered.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
