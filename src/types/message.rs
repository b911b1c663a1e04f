//! Transcript message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Identifier of a single message within a thread.
pub type MessageId = Uuid;

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation. Messages are never edited after they are
/// appended, except for the mutable fields of their tool calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User(UserMessage),
    Assistant(AssistantMessage),
}

impl Message {
    pub fn id(&self) -> MessageId {
        match self {
            Self::User(m) => m.id,
            Self::Assistant(m) => m.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::User(_) => Role::User,
            Self::Assistant(_) => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User(m) => &m.content,
            Self::Assistant(m) => &m.content,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::User(m) => m.created_at,
            Self::Assistant(m) => m.created_at,
        }
    }

    /// Tool calls carried by this message (always empty for user messages).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::User(_) => &[],
            Self::Assistant(m) => &m.tool_calls,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Self::Assistant(m) => Some(m),
            Self::User(_) => None,
        }
    }
}

impl From<UserMessage> for Message {
    fn from(message: UserMessage) -> Self {
        Self::User(message)
    }
}

impl From<AssistantMessage> for Message {
    fn from(message: AssistantMessage) -> Self {
        Self::Assistant(message)
    }
}

/// A message written by a person (or another bot) in the thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserMessage {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            content: content.into(),
            attachments: Vec::new(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// A reply produced by the agent, possibly requesting tool invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantMessage {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

impl AssistantMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            content: content.into(),
            attachments: Vec::new(),
            name: None,
            tool_calls: Vec::new(),
            reply_to: None,
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn replying_to(mut self, id: MessageId) -> Self {
        self.reply_to = Some(id);
        self
    }
}

/// Lifecycle of a single tool invocation.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolCallStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ToolCallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One requested invocation of a named tool.
///
/// Created as a draft from model output; `status`, `task`, `result` and
/// `error` evolve in place once the call is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Provider-assigned call id, when the provider supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCall {
    /// Create a draft call with no provider id.
    pub fn new(tool: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: None,
            tool: tool.into(),
            args,
            status: ToolCallStatus::Pending,
            task: None,
            result: None,
            error: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Apply a partial update to the mutable fields.
    pub fn apply(&mut self, patch: &ToolCallPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(ref task) = patch.task {
            self.task = Some(task.clone());
        }
        if let Some(ref result) = patch.result {
            self.result = Some(result.clone());
        }
        if let Some(ref error) = patch.error {
            self.error = Some(error.clone());
        }
    }
}

/// Partial update of a [`ToolCall`]'s mutable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolCallStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallPatch {
    pub fn running(task: impl Into<String>) -> Self {
        Self {
            status: Some(ToolCallStatus::Running),
            task: Some(task.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ToolCallStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
