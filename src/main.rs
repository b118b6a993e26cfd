//! Entry point for mcp-chat, a terminal chat agent whose model can call tools
//! discovered from an MCP server.
//!
//! This binary loads environment variables, parses CLI arguments via [`cli`],
//! sets up logging and dispatches to the appropriate subcommand handler.

mod agent;
mod chat;
mod cli;
mod config;
mod constants;
mod mcp;
mod output;
mod provider;
mod schema;
mod tools;
mod transcript;

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Runs the mcp-chat CLI.
///
/// Loads `.env` files (silently ignored if absent), parses command-line
/// arguments into a [`cli::Cli`] struct, and dispatches the chosen
/// subcommand via [`cli::run`].
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = cli::parse();
    init_logging(cli.global.verbose);
    cli::run(cli).await
}

/// Diagnostics go to stderr so they never interleave with streamed answers.
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "mcp_chat=debug,warn" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
