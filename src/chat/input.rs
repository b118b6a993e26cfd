//! Human input sources for the session driver.

use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::Config;
use crate::constants::HISTORY_FILENAME;

/// Somewhere human input lines come from.
#[async_trait(?Send)]
pub trait InputSource {
    /// Returns the next line, or `None` at end of input.
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Interactive terminal input with line editing and persistent history.
///
/// - **Ctrl+C**: cancels the current line and prompts again
/// - **Ctrl+D**: ends input
pub struct LineEditor {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl LineEditor {
    pub fn new() -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        let history_path = Config::cache_dir().ok().map(|dir| dir.join(HISTORY_FILENAME));
        if let Some(path) = &history_path {
            if path.exists() {
                let _ = editor.load_history(path);
            }
        }
        Ok(Self {
            editor,
            history_path,
        })
    }

    /// Writes the readline history to the cache dir.
    pub fn save_history(&mut self) -> Result<()> {
        let Some(path) = &self.history_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _ = self.editor.save_history(path);
        Ok(())
    }
}

#[async_trait(?Send)]
impl InputSource for LineEditor {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        loop {
            match self.editor.readline(&prompt.green().bold().to_string()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = self.editor.add_history_entry(line.as_str());
                    }
                    return Ok(Some(line));
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                }
                Err(ReadlineError::Eof) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Fixed lines, then end of input. Backs `ask` and scripted sessions.
#[derive(Debug, Default)]
pub struct QueuedInput {
    lines: VecDeque<String>,
}

impl QueuedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait(?Send)]
impl InputSource for QueuedInput {
    async fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}
