//! Output rendering abstraction for mcp-chat.
//!
//! Defines the [`Renderer`] trait that decouples the agent loop from the
//! display layer. [`StdoutRenderer`] prints to the terminal; tests record the
//! calls instead.

use colored::Colorize;
use serde_json::Value;
use std::io::{self, Write};

use crate::constants::TOOL_RESULT_PREVIEW_CHARS;
use crate::tools::ToolResult;

/// Trait for rendering model output and tool activity.
pub trait Renderer: Send {
    /// Render a single token as it arrives.
    fn render_token(&mut self, token: &str);

    /// Called before a tool call is dispatched.
    fn tool_start(&mut self, name: &str, args: &Value);

    /// Called with the outcome of a tool call.
    fn tool_result(&mut self, name: &str, result: &ToolResult);

    /// Called with the final answer of a human turn.
    fn render_answer(&mut self, text: &str);

    /// Called when the full response is complete.
    fn render_done(&mut self);

    /// Called when an error ends the current turn.
    fn render_error(&mut self, err: &str);
}

/// Renders streaming LLM output directly to stdout.
///
/// Each token is printed immediately with an explicit flush so the user
/// sees a "typing" effect. Answers that were already streamed are not
/// printed a second time.
pub struct StdoutRenderer {
    token_count: usize,
    buffer: String,
}

impl StdoutRenderer {
    pub fn new() -> Self {
        Self {
            token_count: 0,
            buffer: String::new(),
        }
    }

    /// Ends a streamed line before printing something else.
    fn break_stream(&mut self) {
        if !self.buffer.is_empty() && !self.buffer.ends_with('\n') {
            println!();
        }
        self.buffer.clear();
    }
}

impl Default for StdoutRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for StdoutRenderer {
    fn render_token(&mut self, token: &str) {
        self.buffer.push_str(token);
        print!("{}", token);
        // Flush immediately so each token appears as it arrives
        io::stdout().flush().ok();
        self.token_count += 1;
    }

    fn tool_start(&mut self, name: &str, args: &Value) {
        self.break_stream();
        println!("{} {} {}", "⚙".yellow(), name.yellow().bold(), args.to_string().dimmed());
    }

    fn tool_result(&mut self, name: &str, result: &ToolResult) {
        let preview: String = result.content.chars().take(TOOL_RESULT_PREVIEW_CHARS).collect();
        let ellipsis = if result.content.chars().count() > TOOL_RESULT_PREVIEW_CHARS {
            "…"
        } else {
            ""
        };
        let marker = if result.is_error() {
            "✗".red()
        } else {
            "✓".green()
        };
        println!(
            "{} {} {}",
            marker,
            name.dimmed(),
            format!("{preview}{ellipsis}").dimmed()
        );
    }

    fn render_answer(&mut self, text: &str) {
        // Streaming backends have already shown the text token by token
        if self.buffer.trim().is_empty() {
            println!("{}", text);
        }
    }

    fn render_done(&mut self) {
        self.break_stream();
        println!();
        println!("{}", format!("[{} tokens]", self.token_count).dimmed());
        self.token_count = 0;
    }

    fn render_error(&mut self, err: &str) {
        self.break_stream();
        eprintln!("{} {}", "error:".red().bold(), err);
    }
}
