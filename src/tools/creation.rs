//! Content records produced by completed tool tasks.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::task::TaskHandle;
use crate::error::{Result, ThreadError};

/// A media file registered against the task that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Creation {
    pub id: Uuid,
    pub user: String,
    pub requester: String,
    pub task: String,
    pub tool: String,
    pub filename: String,
    #[serde(rename = "mediaAttributes")]
    pub media_attributes: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Creation {
    /// Build a creation for a task output. The name comes from the task's
    /// `prompt` argument, falling back to `text_input`.
    pub fn from_task(task: &TaskHandle, filename: String, media_attributes: Value) -> Self {
        let name = ["prompt", "text_input"]
            .iter()
            .find_map(|key| task.args.get(*key).and_then(Value::as_str))
            .map(str::to_string);
        Self {
            id: Uuid::new_v4(),
            user: task.user.clone(),
            requester: task.requester.clone(),
            task: task.id.clone(),
            tool: task.tool.clone(),
            filename,
            media_attributes,
            name,
            created_at: Utc::now(),
        }
    }
}

/// Stores creations. Failures never abort the tool call that produced one.
#[async_trait]
pub trait CreationRegistrar: Send + Sync {
    async fn register(&self, creation: Creation) -> Result<()>;
}

/// Registrar that keeps creations in memory.
#[derive(Debug, Default)]
pub struct InMemoryCreationRegistrar {
    creations: Mutex<Vec<Creation>>,
}

impl InMemoryCreationRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn creations(&self) -> Vec<Creation> {
        self.creations
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CreationRegistrar for InMemoryCreationRegistrar {
    async fn register(&self, creation: Creation) -> Result<()> {
        self.creations
            .lock()
            .map_err(|_| ThreadError::Persistence("creation store poisoned".into()))?
            .push(creation);
        Ok(())
    }
}
