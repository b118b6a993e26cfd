//! Centralized constants for mcp-chat.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "mcp-chat";

/// Application version, reported to the MCP server during the handshake.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default LLM model identifier.
pub const DEFAULT_MODEL: &str = "llama3.2:3b-instruct-q8_0";

/// Maximum tokens for LLM completions.
pub const MAX_TOKENS: u64 = 4096;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.1;

/// Default number of retries for a failed model request.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Delay added per retry attempt (linear backoff).
pub const RETRY_BACKOFF_MS: u64 = 500;

/// Default cap on tool-execution rounds within one human turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 25;

/// Default system instruction, rendered ahead of every model call.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "In this environment you have access to a set of tools you can use to answer the user's question.\n \
Don't ask user to execute the functions and decide yourself whether to call the tool or not.\n\
Never call more than one tool at a time.";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Per-project configuration filename.
pub const PROJECT_CONFIG_FILENAME: &str = "mcp-chat.toml";

/// Readline history filename.
pub const HISTORY_FILENAME: &str = "chat_history.txt";

/// Readline prompt shown before each human input.
pub const INPUT_PROMPT: &str = "You: ";

// --- Provider defaults ---

/// Default provider when none is configured.
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Default base URL for local Ollama server.
pub const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default LLM model identifier for Anthropic.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

/// Default LLM model identifier for OpenAI.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";

/// Default LLM model identifier for OpenRouter.
pub const DEFAULT_OPENROUTER_MODEL: &str = "arcee-ai/trinity-large-preview:free";

// --- MCP ---

/// Default SSE endpoint of the MCP tool server.
pub const MCP_DEFAULT_SERVER_URL: &str = "http://localhost:7000/sse";

/// Default timeout for a single MCP request, in seconds.
pub const MCP_REQUEST_TIMEOUT_SECS: u64 = 60;

/// How long to wait for the server's `endpoint` event after connecting.
pub const MCP_ENDPOINT_TIMEOUT_SECS: u64 = 10;

/// Maximum characters of a tool result echoed to the terminal.
pub const TOOL_RESULT_PREVIEW_CHARS: usize = 200;
