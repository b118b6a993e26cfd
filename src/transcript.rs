//! Conversation transcript for one chat session.
//!
//! The [`Transcript`] is an append-only log of [`Turn`]s. The system
//! instruction is held separately and injected at the front by
//! [`Transcript::render`], so every model call sees it no matter how long the
//! conversation grows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolResult;

/// A tool invocation requested by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation token, unique within one model response.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub args: Value,
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    SystemInstruction { text: String },
    HumanInput { text: String },
    ModelResponse {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    ToolOutcome { result: ToolResult },
}

impl Turn {
    pub fn human(text: impl Into<String>) -> Self {
        Self::HumanInput { text: text.into() }
    }

    pub fn model(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::ModelResponse {
            text: text.into(),
            tool_calls,
        }
    }

    pub fn outcome(result: ToolResult) -> Self {
        Self::ToolOutcome { result }
    }

    /// The text carried by this turn (tool outcomes yield their content).
    #[cfg(test)]
    pub fn text(&self) -> &str {
        match self {
            Self::SystemInstruction { text }
            | Self::HumanInput { text }
            | Self::ModelResponse { text, .. } => text,
            Self::ToolOutcome { result } => &result.content,
        }
    }
}

/// Ordered, append-only conversation log owned by one session.
#[derive(Debug, Clone)]
pub struct Transcript {
    system: Turn,
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system: Turn::SystemInstruction {
                text: system_instruction.into(),
            },
            turns: Vec::new(),
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The full prompt context: system instruction first, then every appended turn.
    pub fn render(&self) -> Vec<&Turn> {
        std::iter::once(&self.system).chain(self.turns.iter()).collect()
    }

    /// Appended turns, without the system instruction.
    #[cfg(test)]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Ids of tool call requests that are not answered by exactly one
    /// matching outcome before the next model response.
    ///
    /// An empty result means the transcript is safe to send to the model.
    pub fn unpaired_call_ids(&self) -> Vec<String> {
        let mut unpaired = Vec::new();
        let mut window: Vec<(String, usize)> = Vec::new();

        fn flush(window: &mut Vec<(String, usize)>, unpaired: &mut Vec<String>) {
            unpaired.extend(
                window
                    .drain(..)
                    .filter(|(_, answers)| *answers != 1)
                    .map(|(id, _)| id),
            );
        }

        for turn in &self.turns {
            match turn {
                Turn::ModelResponse { tool_calls, .. } => {
                    flush(&mut window, &mut unpaired);
                    window.extend(tool_calls.iter().map(|call| (call.id.clone(), 0)));
                }
                Turn::ToolOutcome { result } => {
                    if let Some(entry) = window.iter_mut().find(|(id, _)| *id == result.correlation_id) {
                        entry.1 += 1;
                    }
                }
                _ => {}
            }
        }
        flush(&mut window, &mut unpaired);
        unpaired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            args: json!({}),
        }
    }

    #[test]
    fn test_render_prefixes_system_instruction() {
        let mut transcript = Transcript::new("be helpful");
        assert_eq!(transcript.render().len(), 1);

        transcript.append(Turn::human("hi"));
        transcript.append(Turn::model("hello", vec![]));

        let rendered = transcript.render();
        assert_eq!(rendered.len(), 3);
        assert_eq!(
            rendered[0],
            &Turn::SystemInstruction {
                text: "be helpful".to_string()
            }
        );
        assert_eq!(rendered[1].text(), "hi");
        assert_eq!(rendered[2].text(), "hello");
        // the system instruction is not part of the appended history
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_paired_transcript_has_no_unpaired_ids() {
        let mut transcript = Transcript::new("sys");
        transcript.append(Turn::human("q"));
        transcript.append(Turn::model("", vec![call("a", "t"), call("b", "t")]));
        transcript.append(Turn::outcome(ToolResult::success("b", "2")));
        transcript.append(Turn::outcome(ToolResult::success("a", "1")));
        transcript.append(Turn::model("done", vec![]));

        assert!(transcript.unpaired_call_ids().is_empty());
    }

    #[test]
    fn test_missing_and_duplicate_outcomes_are_reported() {
        let mut transcript = Transcript::new("sys");
        transcript.append(Turn::model("", vec![call("a", "t"), call("b", "t")]));
        transcript.append(Turn::outcome(ToolResult::success("a", "1")));
        transcript.append(Turn::outcome(ToolResult::success("a", "1 again")));
        transcript.append(Turn::model("", vec![call("c", "t")]));

        assert_eq!(transcript.unpaired_call_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_turn_serializes_with_kind_tag() {
        let value = serde_json::to_value(Turn::model("x", vec![call("a", "t")])).unwrap();
        assert_eq!(value["kind"], "model_response");
        assert_eq!(value["tool_calls"][0]["id"], "a");
    }
}
