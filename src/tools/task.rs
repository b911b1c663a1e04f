//! Handles and outcomes for externally executed tool tasks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::types::{ToolCallPatch, ToolCallStatus};

/// Status reported by a task backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl From<TaskStatus> for ToolCallStatus {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => ToolCallStatus::Pending,
            TaskStatus::Running => ToolCallStatus::Running,
            TaskStatus::Completed => ToolCallStatus::Completed,
            TaskStatus::Failed => ToolCallStatus::Failed,
            TaskStatus::Cancelled => ToolCallStatus::Cancelled,
        }
    }
}

/// Opaque reference to a started task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskHandle {
    pub id: String,
    pub tool: String,
    /// User the task is billed to.
    pub user: String,
    /// Agent that requested the task.
    pub requester: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// Final state of a task as reported by its backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn completed(result: Value) -> Self {
        Self {
            status: TaskStatus::Completed,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Patch recording this outcome on a tool call.
    pub fn to_patch(&self) -> ToolCallPatch {
        ToolCallPatch {
            status: Some(self.status.into()),
            task: None,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    /// First output file and its media attributes, if the task produced one.
    ///
    /// Accepts either `{"output": [...]}` or a list of such samples.
    pub fn media_output(&self) -> Option<(String, Value)> {
        let result = self.result.as_ref()?;
        let sample = match result {
            Value::Array(samples) => samples.first()?,
            other => other,
        };
        let output = match sample.get("output")? {
            Value::Array(items) => items.first()?,
            item => item,
        };
        let filename = output.get("filename")?.as_str()?.to_string();
        let media = output.get("mediaAttributes")?.clone();
        if media.is_null() {
            return None;
        }
        Some((filename, media))
    }
}
