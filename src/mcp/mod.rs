//! MCP client over the HTTP+SSE transport.
//!
//! [`McpClient::connect`] opens the event stream, performs the `initialize`
//! handshake and then serves as the [`ToolSource`] behind the tool registry.

mod protocol;
mod sse;
mod transport;

use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Implementation, InitializeResult, JsonObject, ListToolsResult};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::Config;
use crate::tools::{ToolDescriptor, ToolSource, ToolSourceError};
use protocol::{initialize_params, to_params, PROTOCOL_VERSION};
use transport::SseTransport;

/// Everything needed to reach one MCP server.
#[derive(Debug, Clone)]
pub struct McpSettings {
    pub server_url: String,
    pub auth_token: Option<String>,
    pub client_name: String,
    pub client_version: String,
    pub request_timeout: Duration,
}

impl McpSettings {
    pub fn from_config(config: &Config) -> Self {
        let (client_name, client_version) = config.mcp_client_info();
        Self {
            server_url: config.mcp_server_url(),
            auth_token: config.mcp_auth_token(),
            client_name,
            client_version,
            request_timeout: config.mcp_request_timeout(),
        }
    }
}

/// An initialized MCP session.
pub struct McpClient {
    transport: SseTransport,
    server: Implementation,
}

fn decode<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, ToolSourceError> {
    serde_json::from_value(result)
        .map_err(|e| ToolSourceError::Protocol(format!("bad {method} result: {e}")))
}

impl McpClient {
    /// Connects and completes the `initialize` / `notifications/initialized`
    /// handshake.
    pub async fn connect(settings: &McpSettings) -> Result<Self, ToolSourceError> {
        let transport = SseTransport::connect(
            &settings.server_url,
            settings.auth_token.clone(),
            settings.request_timeout,
        )
        .await?;

        let params = to_params(&initialize_params(&settings.client_name, &settings.client_version))
            .map_err(ToolSourceError::Protocol)?;
        let result = transport.request("initialize", params).await?;
        let init: InitializeResult = decode("initialize", result)?;
        if init.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                server = ?init.protocol_version,
                client = ?PROTOCOL_VERSION,
                "mcp protocol version mismatch"
            );
        }

        transport
            .notify("notifications/initialized", JsonObject::new())
            .await?;
        tracing::info!(url = %settings.server_url, "mcp session initialized");

        Ok(Self {
            transport,
            server: init.server_info,
        })
    }

    /// Name and version the server reported, e.g. `demo 1.0`.
    pub fn server_label(&self) -> String {
        format!("{} {}", self.server.name, self.server.version)
    }
}

#[async_trait]
impl ToolSource for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolSourceError> {
        let result = self.transport.request("tools/list", JsonObject::new()).await?;
        let listing: ListToolsResult = decode("tools/list", result)?;
        if let Some(cursor) = listing.next_cursor {
            // One page is all we fetch
            tracing::warn!(%cursor, "tool listing is paginated; later pages ignored");
        }
        Ok(listing.tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<CallToolResult, ToolSourceError> {
        let params = to_params(&json!({ "name": name, "arguments": args }))
            .map_err(ToolSourceError::Protocol)?;
        let result = self.transport.request("tools/call", params).await?;
        decode("tools/call", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result_text;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

    fn settings(addr: std::net::SocketAddr, token: Option<&str>) -> McpSettings {
        McpSettings {
            server_url: format!("http://{addr}/sse"),
            auth_token: token.map(String::from),
            client_name: "mcp-chat".to_string(),
            client_version: "0.0.0".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// How the fixture server behaves once the session is initialized.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        /// Answers every request.
        Answer,
        /// Accepts requests but never answers them.
        Silent,
        /// Ends the event stream.
        HangUp,
        /// Sends one `ping` request (id 7) down the stream.
        Ping,
    }

    /// Starts the fixture server; the receiver yields every POSTed message.
    async fn start(mode: Mode) -> (std::net::SocketAddr, UnboundedReceiver<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = unbounded_channel();
        tokio::spawn(serve(listener, seen_tx, mode));
        (addr, seen_rx)
    }

    /// Reads one HTTP request, returning its head and body.
    async fn read_request(stream: &mut TcpStream) -> (String, String) {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 1024];
        loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                let len = head
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let mut body = buf[pos + 4..].to_vec();
                while body.len() < len {
                    let n = stream.read(&mut tmp).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    body.extend_from_slice(&tmp[..n]);
                }
                return (head, String::from_utf8_lossy(&body).to_string());
            }
            let n = stream.read(&mut tmp).await.unwrap();
            if n == 0 {
                return (String::from_utf8_lossy(&buf).to_string(), String::new());
            }
            buf.extend_from_slice(&tmp[..n]);
        }
    }

    async fn write_chunk(stream: &mut TcpStream, data: &str) {
        let chunk = format!("{:x}\r\n{}\r\n", data.len(), data);
        stream.write_all(chunk.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
    }

    /// A minimal MCP server: one SSE stream, every POST answered with 202 and
    /// its JSON-RPC response pushed down the stream.
    async fn serve(listener: TcpListener, seen: UnboundedSender<Value>, mode: Mode) {
        let (mut sse, _) = listener.accept().await.unwrap();
        let (head, _) = read_request(&mut sse).await;
        assert!(head.starts_with("GET /sse"), "unexpected request: {head}");
        sse.write_all(
            b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
        )
        .await
        .unwrap();
        write_chunk(&mut sse, ": hello\n\nevent: endpoint\ndata: /messages?sessionId=t1\n\n").await;
        let mut sse = Some(sse);

        loop {
            let (mut conn, _) = listener.accept().await.unwrap();
            let (head, body) = read_request(&mut conn).await;
            assert!(head.starts_with("POST /messages?sessionId=t1"), "unexpected request: {head}");
            conn.write_all(b"HTTP/1.1 202 Accepted\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            drop(conn);

            let message: Value = serde_json::from_str(&body).unwrap();
            let _ = seen.send(message.clone());

            if message["method"] == "notifications/initialized" {
                match mode {
                    Mode::HangUp => {
                        if let Some(mut stream) = sse.take() {
                            stream.write_all(b"0\r\n\r\n").await.unwrap();
                            stream.shutdown().await.unwrap();
                        }
                    }
                    Mode::Ping => {
                        if let Some(stream) = sse.as_mut() {
                            let ping = json!({"jsonrpc": "2.0", "id": 7, "method": "ping"});
                            write_chunk(stream, &format!("event: message\ndata: {ping}\n\n")).await;
                        }
                    }
                    Mode::Answer | Mode::Silent => {}
                }
                continue;
            }
            // Replies to our own requests carry no method
            let (Some(id), Some(method)) = (message.get("id").cloned(), message["method"].as_str())
            else {
                continue;
            };
            if mode == Mode::Silent && method != "initialize" {
                continue;
            }
            let reply = match method {
                "initialize" => json!({"jsonrpc": "2.0", "id": id, "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "demo", "version": "1.0"}
                }}),
                "tools/list" => json!({"jsonrpc": "2.0", "id": id, "result": {"tools": [{
                    "name": "add",
                    "description": "Add two numbers",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                        "required": ["a", "b"]
                    }
                }]}}),
                "tools/call" if message["params"]["name"] == "add" => {
                    let sum = message["params"]["arguments"]["a"].as_f64().unwrap()
                        + message["params"]["arguments"]["b"].as_f64().unwrap();
                    json!({"jsonrpc": "2.0", "id": id, "result": {
                        "content": [{"type": "text", "text": sum.to_string()}],
                        "isError": false
                    }})
                }
                _ => json!({"jsonrpc": "2.0", "id": id, "error": {
                    "code": -32602, "message": "Unknown tool"
                }}),
            };
            if let Some(stream) = sse.as_mut() {
                write_chunk(stream, &format!("event: message\ndata: {reply}\n\n")).await;
            }
        }
    }

    #[tokio::test]
    async fn test_handshake_list_and_call() {
        let (addr, mut seen_rx) = start(Mode::Answer).await;

        let client = McpClient::connect(&settings(addr, None)).await.unwrap();
        assert_eq!(client.server_label(), "demo 1.0");

        let init = seen_rx.recv().await.unwrap();
        assert_eq!(init["method"], "initialize");
        assert_eq!(init["params"]["clientInfo"]["name"], "mcp-chat");
        let initialized = seen_rx.recv().await.unwrap();
        assert_eq!(initialized["method"], "notifications/initialized");
        assert!(initialized.get("id").is_none());

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "add");
        assert_eq!(tools[0].input_schema["required"], json!(["a", "b"]));

        let result = client.call_tool("add", json!({"a": 2, "b": 3})).await.unwrap();
        assert_ne!(result.is_error, Some(true));
        assert_eq!(result_text(&result), "5");

        let err = client.call_tool("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::Rpc { code: -32602, .. }));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let (addr, _seen_rx) = start(Mode::Silent).await;
        let mut settings = settings(addr, None);
        settings.request_timeout = Duration::from_millis(300);

        let client = McpClient::connect(&settings).await.unwrap();
        let err = client.list_tools().await.unwrap_err();

        match err {
            ToolSourceError::Timeout { method, .. } => assert_eq!(method, "tools/list"),
            other => panic!("expected a timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_requests_after_stream_end_fail_closed() {
        let (addr, mut seen_rx) = start(Mode::HangUp).await;
        let mut settings = settings(addr, None);
        settings.request_timeout = Duration::from_secs(30);

        let client = McpClient::connect(&settings).await.unwrap();
        // initialize, then notifications/initialized triggers the hang-up
        seen_rx.recv().await.unwrap();
        seen_rx.recv().await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), client.list_tools())
            .await
            .expect("request should not wait for the request timeout")
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::Closed), "got {err}");

        let err = client.call_tool("add", json!({"a": 1, "b": 1})).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::Closed), "got {err}");
    }

    #[tokio::test]
    async fn test_server_ping_is_answered() {
        let (addr, mut seen_rx) = start(Mode::Ping).await;

        let _client = McpClient::connect(&settings(addr, None)).await.unwrap();
        assert_eq!(seen_rx.recv().await.unwrap()["method"], "initialize");
        assert_eq!(
            seen_rx.recv().await.unwrap()["method"],
            "notifications/initialized"
        );

        let reply = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, json!({"jsonrpc": "2.0", "id": 7, "result": {}}));
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_authentication_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let (head, _) = read_request(&mut conn).await;
            assert!(head.to_ascii_lowercase().contains("authorization: bearer wrong"));
            conn.write_all(b"HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let err = McpClient::connect(&settings(addr, Some("wrong")))
            .await
            .err()
            .unwrap();
        assert!(err.is_authentication(), "got {err}");
    }

    #[tokio::test]
    async fn test_server_errors_are_connection_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            read_request(&mut conn).await;
            conn.write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let err = McpClient::connect(&settings(addr, None)).await.err().unwrap();
        assert!(matches!(err, ToolSourceError::Connection(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // bind then drop so nothing listens on the port
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let err = McpClient::connect(&settings(addr, None)).await.err().unwrap();
        assert!(matches!(err, ToolSourceError::Connection(_)));
    }
}
