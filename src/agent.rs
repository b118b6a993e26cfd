//! The tool-calling loop.
//!
//! [`Agent::run_turn`] takes one human input through
//! `AwaitingModel → AwaitingTools → AwaitingModel → … → Idle`: the model is
//! invoked with the rendered transcript, every tool it requests is executed
//! in order, and the outcomes are fed back until the model answers without
//! requesting tools (or the round limit is hit).

use std::collections::HashSet;

use thiserror::Error;

use crate::output::Renderer;
use crate::provider::{ModelBackend, ModelError, ModelResponse};
use crate::tools::{CallContext, ToolRegistry, ToolResult};
use crate::transcript::{ToolCallRequest, Transcript, Turn};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    AwaitingTools,
    Idle,
}

/// What a completed human turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Final model text. When `truncated`, the last non-empty text the model
    /// produced during the turn.
    pub answer: String,
    /// The round limit stopped the loop before the model finished.
    pub truncated: bool,
    /// Tool-execution batches run.
    pub rounds: usize,
    pub model_calls: usize,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Owns the conversation and drives the model/tool exchange.
pub struct Agent {
    model: Box<dyn ModelBackend>,
    registry: ToolRegistry,
    transcript: Transcript,
    max_rounds: usize,
    state: LoopState,
}

impl Agent {
    pub fn new(
        model: Box<dyn ModelBackend>,
        registry: ToolRegistry,
        system_instruction: impl Into<String>,
        max_rounds: usize,
    ) -> Self {
        Self {
            model,
            registry,
            transcript: Transcript::new(system_instruction),
            max_rounds,
            state: LoopState::Idle,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs one human turn to completion.
    ///
    /// # Errors
    ///
    /// A failed model invocation ends the turn. Turns appended before the
    /// failure stay in the transcript; every tool request already recorded
    /// has its outcome, so the transcript remains usable for the next turn.
    pub async fn run_turn(
        &mut self,
        input: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnOutcome, AgentError> {
        self.transcript.append(Turn::human(input));
        let definitions = self.registry.definitions();
        let mut rounds = 0;
        let mut model_calls = 0;
        let mut best_effort = String::new();

        loop {
            self.state = LoopState::AwaitingModel;
            let unpaired = self.transcript.unpaired_call_ids();
            if !unpaired.is_empty() {
                tracing::error!(?unpaired, "tool requests without outcomes");
            }
            let response = self
                .model
                .invoke(&self.transcript.render(), &definitions, renderer)
                .await;
            let ModelResponse {
                text,
                mut tool_calls,
            } = match response {
                Ok(response) => response,
                Err(e) => {
                    self.state = LoopState::Idle;
                    return Err(e.into());
                }
            };
            model_calls += 1;
            unique_call_ids(&mut tool_calls);
            if !text.trim().is_empty() {
                best_effort = text.clone();
            }
            self.transcript.append(Turn::model(text.clone(), tool_calls.clone()));

            if tool_calls.is_empty() {
                self.state = LoopState::Idle;
                return Ok(TurnOutcome {
                    answer: text,
                    truncated: false,
                    rounds,
                    model_calls,
                });
            }

            self.state = LoopState::AwaitingTools;
            if rounds >= self.max_rounds {
                tracing::warn!(
                    max_rounds = self.max_rounds,
                    pending = tool_calls.len(),
                    "tool round limit reached, stopping the turn"
                );
                self.refuse_calls(&tool_calls);
                self.state = LoopState::Idle;
                return Ok(TurnOutcome {
                    answer: best_effort,
                    truncated: true,
                    rounds,
                    model_calls,
                });
            }

            rounds += 1;
            tracing::debug!(round = rounds, calls = tool_calls.len(), "executing tool batch");
            for call in &tool_calls {
                renderer.tool_start(&call.name, &call.args);
                let ctx = CallContext::new(call.id.clone());
                let result = self.registry.execute(&call.name, &call.args, &ctx).await;
                renderer.tool_result(&call.name, &result);
                self.transcript.append(Turn::outcome(result));
            }
        }
    }

    /// Pairs every request of the final batch with an error outcome.
    fn refuse_calls(&mut self, calls: &[ToolCallRequest]) {
        for call in calls {
            let message = format!(
                "round limit reached: tool `{}` was not run ({} tool rounds allowed per turn)",
                call.name, self.max_rounds
            );
            self.transcript
                .append(Turn::outcome(ToolResult::error(call.id.clone(), message)));
        }
    }
}

/// Gives every request in a batch its own id. Backends may reuse an id
/// (or send none) within one response, which would leave outcomes unpairable.
fn unique_call_ids(calls: &mut [ToolCallRequest]) {
    let mut taken = HashSet::new();
    for call in calls.iter_mut() {
        if call.id.is_empty() || !taken.insert(call.id.clone()) {
            let fresh = uuid::Uuid::new_v4().to_string();
            tracing::debug!(tool = %call.name, old = %call.id, new = %fresh, "reassigned tool call id");
            call.id = fresh.clone();
            taken.insert(fresh);
        }
    }
}
