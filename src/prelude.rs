//! Convenience re-exports for common use.

pub use crate::agent::{Agent, KnowledgeDescription, User};
pub use crate::agent_loop::{ThreadRunner, ThreadUpdate};
pub use crate::config::{EngineConfig, PromptOptions};
pub use crate::error::{Result, ThreadError};
pub use crate::generation::{ModelCall, ModelClient};
pub use crate::provider::ModelProvider;
pub use crate::store::{InMemoryThreadStore, ThreadStore};
pub use crate::tools::{FnTool, Tool, ToolCategories, ToolContext, ToolRegistry};
pub use crate::types::{AssistantMessage, Message, ThreadId, ToolCall, UserMessage};
