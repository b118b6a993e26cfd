//! JSON-RPC envelopes for the MCP client.
//!
//! Message and payload types come from [`rmcp::model`]; this module builds
//! the outgoing envelopes and sorts incoming messages by shape.

use std::borrow::Cow;

use rmcp::model::{
    ClientCapabilities, ErrorData, Extensions, Implementation, InitializeRequestParam, JsonObject,
    JsonRpcNotification, JsonRpcRequest, JsonRpcVersion2_0, Notification, NumberOrString,
    ProtocolVersion, Request, Tool,
};
use serde::Serialize;
use serde_json::Value;

use crate::tools::ToolDescriptor;

/// Protocol revision spoken over the HTTP+SSE transport.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V_2024_11_05;

/// Builds an outgoing request.
///
/// Ids go out as strings; [`Incoming::parse`] reads them back as integers.
pub fn request(id: i64, method: &str, params: JsonObject) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: JsonRpcVersion2_0,
        id: NumberOrString::String(id.to_string().into()),
        request: Request {
            method: method.to_string(),
            params,
            extensions: Extensions::default(),
        },
    }
}

/// Builds an outgoing notification (no id, no response expected).
pub fn notification(method: &str, params: JsonObject) -> JsonRpcNotification {
    JsonRpcNotification {
        jsonrpc: JsonRpcVersion2_0,
        notification: Notification {
            method: method.to_string(),
            params,
            extensions: Extensions::default(),
        },
    }
}

/// Serializes typed params into the object a request carries.
pub fn to_params(params: &impl Serialize) -> Result<JsonObject, String> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("params must be an object, got {other}")),
        Err(e) => Err(e.to_string()),
    }
}

/// Parameters of the `initialize` request.
pub fn initialize_params(client_name: &str, client_version: &str) -> InitializeRequestParam {
    InitializeRequestParam {
        protocol_version: PROTOCOL_VERSION,
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: client_name.to_string(),
            version: client_version.to_string(),
            ..Implementation::default()
        },
    }
}

impl From<Tool> for ToolDescriptor {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.into_owned(),
            description: tool.description.map(Cow::into_owned),
            input_schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}

/// A message received from the server, classified by shape.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Answer to one of our requests.
    Response {
        id: i64,
        result: Result<Value, ErrorData>,
    },
    /// A request the server expects us to answer.
    Request { id: Value, method: String },
    Notification { method: String },
}

impl Incoming {
    /// Classifies a decoded JSON-RPC message.
    ///
    /// Requests without `params` are accepted, which the typed envelopes in
    /// `rmcp` reject. Response ids may be numbers or integer strings.
    pub fn parse(message: Value) -> Result<Self, String> {
        let Value::Object(mut map) = message else {
            return Err(format!("expected a JSON-RPC object, got {message}"));
        };

        let method = map.get("method").and_then(Value::as_str).map(String::from);
        let id = map.remove("id");

        match (method, id) {
            (Some(method), Some(id)) => Ok(Self::Request { id, method }),
            (Some(method), None) => Ok(Self::Notification { method }),
            (None, Some(id)) => {
                let id = match &id {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.parse().ok(),
                    _ => None,
                }
                .ok_or_else(|| format!("unsupported response id {id}"))?;

                let result = if let Some(error) = map.remove("error") {
                    Err(serde_json::from_value(error)
                        .map_err(|e| format!("malformed error object: {e}"))?)
                } else {
                    Ok(map.remove("result").unwrap_or(Value::Null))
                };
                Ok(Self::Response { id, result })
            }
            (None, None) => Err("message has neither method nor id".to_string()),
        }
    }
}
