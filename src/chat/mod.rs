//! Session driver for mcp-chat.
//!
//! Reads human input until end-of-input and runs one [`Agent`] turn per
//! line. A failed turn is reported and the session carries on with the next
//! input; the interactive flavour uses [`rustyline`] for line editing and
//! history.

mod input;

pub use input::{InputSource, LineEditor, QueuedInput};

use anyhow::Result;
use colored::Colorize;

use crate::agent::{Agent, LoopState};
use crate::constants::INPUT_PROMPT;
use crate::output::{Renderer, StdoutRenderer};

/// Counts of how a session's turns went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub completed: usize,
    pub failed: usize,
}

/// Drives the agent with lines from `input` until it is exhausted.
///
/// Blank lines are skipped. Only an input failure ends the session early;
/// model failures end just the turn that hit them.
pub async fn run_session(
    agent: &mut Agent,
    input: &mut dyn InputSource,
    renderer: &mut dyn Renderer,
) -> Result<SessionSummary> {
    let mut summary = SessionSummary::default();

    while let Some(line) = input.read_line(INPUT_PROMPT).await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = agent.run_turn(line, renderer).await;
        debug_assert_eq!(agent.state(), LoopState::Idle);
        match result {
            Ok(outcome) => {
                renderer.render_answer(&outcome.answer);
                if outcome.truncated {
                    renderer.render_error(&format!(
                        "stopped after {} tool rounds; the answer may be incomplete",
                        outcome.rounds
                    ));
                }
                renderer.render_done();
                summary.completed += 1;
            }
            Err(e) => {
                tracing::debug!("turn failed: {e}");
                renderer.render_error(&e.to_string());
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

/// Runs the interactive chat REPL on the terminal.
pub async fn run_chat(mut agent: Agent, model: &str) -> Result<()> {
    println!(
        "{} [model: {}] [tools: {}] (Ctrl+D to exit)",
        "mcp-chat".bold().cyan(),
        model.yellow(),
        agent.registry().len().to_string().yellow(),
    );
    println!();

    let mut editor = LineEditor::new()?;
    let mut renderer = StdoutRenderer::new();
    let result = run_session(&mut agent, &mut editor, &mut renderer).await;
    editor.save_history()?;

    let summary = result?;
    tracing::debug!(
        completed = summary.completed,
        failed = summary.failed,
        turns = agent.transcript().len(),
        "session ended"
    );
    println!("{}", "goodbye.".dimmed());
    Ok(())
}
