//! Normalized model output events.

use super::generation::FinishReason;
use super::message::ToolCall;

/// One event of a model invocation, streaming or not.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Incremental text fragment.
    Token(String),
    /// A tool-call draft whose arguments are complete.
    ToolCall(ToolCall),
    /// Terminal signal derived from the provider's finish reason.
    Stop(FinishReason),
}

/// Collected result of one model round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutput {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    /// The model considers its turn finished.
    pub stop: bool,
}

impl ModelOutput {
    /// Expand into the event vocabulary: one content event, the tool-call
    /// drafts, then exactly one stop event.
    pub fn into_events(self) -> Vec<ModelEvent> {
        let mut events = Vec::with_capacity(self.tool_calls.len() + 2);
        if !self.content.is_empty() {
            events.push(ModelEvent::Token(self.content));
        }
        events.extend(self.tool_calls.into_iter().map(ModelEvent::ToolCall));
        events.push(ModelEvent::Stop(if self.stop {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        }));
        events
    }
}
