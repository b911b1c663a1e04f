//! Thread update stream types.

use serde::{Deserialize, Serialize};

use crate::types::AssistantMessage;

/// Externally observed unit of progress of one thread prompt.
///
/// A turn that reaches the model always begins with [`StartPrompt`] and ends
/// with exactly one [`EndPrompt`].
///
/// [`StartPrompt`]: ThreadUpdate::StartPrompt
/// [`EndPrompt`]: ThreadUpdate::EndPrompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThreadUpdate {
    StartPrompt,
    /// Streaming fragment of the assistant's reply.
    AssistantToken {
        text: String,
    },
    /// A completed assistant message, already persisted.
    AssistantMessage {
        message: AssistantMessage,
    },
    ToolCallStarted {
        tool_name: String,
        tool_index: usize,
        task: String,
    },
    ToolComplete {
        tool_name: String,
        tool_index: usize,
        result: serde_json::Value,
    },
    /// A failed tool call (with its name and index) or a failed round.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_index: Option<usize>,
        /// The apology appended when a round fails.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<AssistantMessage>,
        error: String,
    },
    EndPrompt,
}

impl ThreadUpdate {
    pub fn tool_error(tool_name: impl Into<String>, tool_index: usize, error: impl Into<String>) -> Self {
        Self::Error {
            tool_name: Some(tool_name.into()),
            tool_index: Some(tool_index),
            message: None,
            error: error.into(),
        }
    }

    pub fn turn_error(message: AssistantMessage, error: impl Into<String>) -> Self {
        Self::Error {
            tool_name: None,
            tool_index: None,
            message: Some(message),
            error: error.into(),
        }
    }

    /// Failure before a turn started, such as a rejected rate limit.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self::Error {
            tool_name: None,
            tool_index: None,
            message: None,
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
