//! Transcript rendering shared by the provider wire formats.

use crate::types::{AssistantMessage, ToolCall, ToolCallStatus, UserMessage};

/// Provider-facing id of a tool call. Calls without a provider id get one
/// derived from their message and position, so it is stable across rounds.
pub fn tool_call_id(message: &AssistantMessage, index: usize, call: &ToolCall) -> String {
    call.id
        .clone()
        .unwrap_or_else(|| format!("call_{}_{index}", message.id.simple()))
}

/// Text fed back to the model as the outcome of a tool call.
pub fn tool_result_text(call: &ToolCall) -> String {
    match (&call.result, &call.error) {
        (Some(result), _) => result.to_string(),
        (None, Some(error)) => format!("Error: {error}"),
        (None, None) => format!("Tool call status: {}", call.status),
    }
}

pub fn tool_result_is_error(call: &ToolCall) -> bool {
    matches!(
        call.status,
        ToolCallStatus::Failed | ToolCallStatus::Cancelled
    )
}

/// User content with attachment URLs appended.
pub fn user_text(message: &UserMessage) -> String {
    if message.attachments.is_empty() {
        message.content.clone()
    } else {
        format!(
            "{}\n\nAttachments: {}",
            message.content,
            message.attachments.join(", ")
        )
    }
}
