//! Command-line interface definition and dispatch for mcp-chat.
//!
//! Uses [`clap`] for argument parsing with derive macros. Each subcommand is
//! routed to its handler; connecting to the tool server and assembling the
//! agent live in the [`setup`] submodule.

mod setup;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::chat::{self, QueuedInput};
use crate::output::StdoutRenderer;
use crate::{config, provider};

/// Top-level CLI structure for mcp-chat.
#[derive(Parser)]
#[command(
    name = "mcp-chat",
    version,
    about = "Chat with a language model that can call tools from an MCP server"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand; they override the config files.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Provider to use (ollama, anthropic, openai, openrouter)
    #[arg(long, global = true)]
    pub provider: Option<String>,
    /// Model to use; accepts `provider/model` shorthand
    #[arg(short, long, global = true)]
    pub model: Option<String>,
    /// SSE endpoint of the MCP server
    #[arg(long, global = true)]
    pub server: Option<String>,
    /// Maximum tool rounds per question
    #[arg(long, global = true)]
    pub max_rounds: Option<usize>,
    /// Log protocol traffic and loop progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands.
///
/// The `///` doc comments on variants double as `--help` text.
#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Ask a single question, then exit
    Ask {
        /// The question to ask
        prompt: Vec<String>,
    },
    /// List the tools the MCP server offers
    Tools,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Subcommands for the `config` command.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the resolved config and where it was loaded from
    Show,
}

/// Parses command-line arguments into a [`Cli`] struct.
///
/// Delegates to [`clap::Parser::parse`], which exits the process on invalid input.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    let Cli { global, command } = cli;

    match command {
        Commands::Chat => {
            let config = setup::load_config(&global)?;
            let selection =
                provider::resolve_model(global.provider.as_deref(), global.model.as_deref(), &config)?;
            let registry = setup::connect_tools(&config).await?;
            let agent = setup::build_agent(&config, &selection, registry)?;
            chat::run_chat(agent, &selection.model).await
        }
        Commands::Ask { prompt } => {
            let prompt = prompt.join(" ");
            if prompt.trim().is_empty() {
                anyhow::bail!("No prompt provided. Usage: mcp-chat ask \"your question here\"");
            }

            let config = setup::load_config(&global)?;
            let selection =
                provider::resolve_model(global.provider.as_deref(), global.model.as_deref(), &config)?;
            let registry = setup::connect_tools(&config).await?;
            let mut agent = setup::build_agent(&config, &selection, registry)?;

            println!(
                "{} [model: {}]",
                "mcp-chat".bold().cyan(),
                selection.model.yellow(),
            );
            println!();
            println!("{} {}", ">".green().bold(), prompt);
            println!();

            let mut input = QueuedInput::new([prompt]);
            let mut renderer = StdoutRenderer::new();
            let summary = chat::run_session(&mut agent, &mut input, &mut renderer).await?;
            if summary.failed > 0 {
                anyhow::bail!("the question could not be answered");
            }
            Ok(())
        }
        Commands::Tools => {
            let config = setup::load_config(&global)?;
            let registry = setup::connect_tools(&config).await?;
            setup::print_tools(&registry);
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = setup::load_config(&global)?;
                let path = config::Config::config_path()?;
                println!("{} {}", "Config path:".bold(), path.display());
                println!();
                println!("{}", toml::to_string_pretty(&config.redacted())?);
                Ok(())
            }
        },
    }
}
