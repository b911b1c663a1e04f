//! Thread transcript and active-turn bookkeeping.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, MessageId, ToolCallPatch};
use crate::error::{Result, ThreadError};

/// Identifier of a conversation thread.
pub type ThreadId = Uuid;

/// Change to the active set applied atomically with an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveChange {
    #[default]
    None,
    Activate(MessageId),
    Deactivate(MessageId),
}

/// Ordered transcript plus the user messages whose replies are in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: ThreadId,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub active: Vec<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Thread {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: ThreadId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            active: Vec::new(),
            title: None,
        }
    }

    /// Append messages and apply an active-set change in one step.
    pub fn push(&mut self, messages: impl IntoIterator<Item = Message>, change: ActiveChange) {
        self.messages.extend(messages);
        match change {
            ActiveChange::None => {}
            ActiveChange::Activate(id) => {
                if !self.active.contains(&id) {
                    self.active.push(id);
                }
            }
            ActiveChange::Deactivate(id) => self.active.retain(|active| *active != id),
        }
    }

    /// Patch one tool call, addressed by its owning message and index.
    pub fn update_tool_call(
        &mut self,
        message_id: MessageId,
        index: usize,
        patch: &ToolCallPatch,
    ) -> Result<()> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id() == message_id)
            .ok_or_else(|| ThreadError::InvalidState(format!("message {message_id} not found")))?;
        let Message::Assistant(assistant) = message else {
            return Err(ThreadError::InvalidState(format!(
                "message {message_id} is not an assistant message"
            )));
        };
        let call = assistant.tool_calls.get_mut(index).ok_or_else(|| {
            ThreadError::InvalidState(format!(
                "tool call {index} out of range for message {message_id}"
            ))
        })?;
        call.apply(patch);
        Ok(())
    }

    /// The last `limit` messages in transcript order.
    pub fn recent_messages(&self, limit: usize) -> Vec<Message> {
        let start = self.messages.len().saturating_sub(limit);
        self.messages[start..].to_vec()
    }

    pub fn is_active(&self, id: MessageId) -> bool {
        self.active.contains(&id)
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::{AssistantMessage, ToolCall, ToolCallStatus, UserMessage};

    #[test]
    fn push_activates_and_deactivates_in_one_step() {
        let mut thread = Thread::new();
        let user = UserMessage::new("hello");
        let user_id = user.id;
        thread.push([user.into()], ActiveChange::Activate(user_id));
        assert!(thread.is_active(user_id));

        let reply = AssistantMessage::new("hi").replying_to(user_id);
        thread.push([reply.into()], ActiveChange::Deactivate(user_id));
        assert!(!thread.is_active(user_id));
        assert_eq!(thread.messages.len(), 2);
    }

    #[test]
    fn update_tool_call_rejects_unknown_index() {
        let mut thread = Thread::new();
        let reply = AssistantMessage::new("")
            .with_tool_calls(vec![ToolCall::new("web_search", Default::default())]);
        let reply_id = reply.id;
        thread.push([reply.into()], ActiveChange::None);

        thread
            .update_tool_call(reply_id, 0, &ToolCallPatch::failed("boom"))
            .unwrap();
        assert_eq!(
            thread.messages[0].tool_calls()[0].status,
            ToolCallStatus::Failed
        );
        assert!(thread
            .update_tool_call(reply_id, 3, &ToolCallPatch::failed("boom"))
            .is_err());
    }

    #[test]
    fn recent_messages_keeps_the_tail() {
        let mut thread = Thread::new();
        for i in 0..30 {
            thread.push([UserMessage::new(format!("m{i}")).into()], ActiveChange::None);
        }
        let recent = thread.recent_messages(25);
        assert_eq!(recent.len(), 25);
        assert_eq!(recent[0].content(), "m5");
        assert_eq!(recent[24].content(), "m29");
    }
}
