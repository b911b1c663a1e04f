//! Finish reasons and response formats.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Requested response format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonSchema {
        schema: serde_json::Value,
        name: String,
    },
}

impl ResponseFormat {
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::JsonSchema { .. })
    }
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

impl FinishReason {
    /// Parse a provider finish reason. Anthropic reports `end_turn`,
    /// OpenAI reports `stop`; both mean natural completion.
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" => Self::Stop,
            "length" | "max_tokens" => Self::Length,
            "tool_calls" | "tool_use" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other,
        }
    }

    /// The model considers its turn finished.
    pub fn is_natural_completion(self) -> bool {
        self == Self::Stop
    }
}
