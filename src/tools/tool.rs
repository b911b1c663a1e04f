//! Tool trait and closure-based tool wrapper.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::task::{TaskHandle, TaskOutcome};
use super::types::ToolParameters;
use crate::error::{Result, ThreadError};
use crate::provider::ToolDefinition;

/// Who is invoking a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolContext {
    pub user_id: String,
    pub agent_id: String,
}

impl ToolContext {
    pub fn new(user_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            agent_id: agent_id.into(),
        }
    }
}

/// A named capability the model can invoke. Work happens in an external
/// task: `start` hands back a handle, `wait` resolves it.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &ToolParameters;

    /// Start a task for the given arguments.
    async fn start(&self, ctx: &ToolContext, args: &Map<String, Value>) -> Result<TaskHandle>;

    /// Wait until the task reaches a final state.
    async fn wait(&self, task: &TaskHandle) -> Result<TaskOutcome>;

    /// Best-effort cancellation.
    async fn cancel(&self, _task: &TaskHandle) -> Result<()> {
        Ok(())
    }

    /// Definition sent to model providers.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

type ToolHandler =
    dyn Fn(ToolContext, Map<String, Value>) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>>
        + Send
        + Sync;

/// Closure-based tool that runs each task on the tokio runtime.
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
    /// Started tasks, held until `wait` or `cancel` takes them.
    running: Mutex<HashMap<String, JoinHandle<Result<Value>>>>,
}

impl FnTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
            running: Mutex::new(HashMap::new()),
        }
    }

    fn take_running(&self, id: &str) -> Result<Option<JoinHandle<Result<Value>>>> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| ThreadError::InvalidState("tool task table poisoned".into()))?;
        Ok(running.remove(id))
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn start(&self, ctx: &ToolContext, args: &Map<String, Value>) -> Result<TaskHandle> {
        let task = TaskHandle {
            id: Uuid::new_v4().to_string(),
            tool: self.name.clone(),
            user: ctx.user_id.clone(),
            requester: ctx.agent_id.clone(),
            args: args.clone(),
        };
        let join = tokio::spawn((self.handler)(ctx.clone(), args.clone()));
        self.running
            .lock()
            .map_err(|_| ThreadError::InvalidState("tool task table poisoned".into()))?
            .insert(task.id.clone(), join);
        Ok(task)
    }

    async fn wait(&self, task: &TaskHandle) -> Result<TaskOutcome> {
        let join = self.take_running(&task.id)?.ok_or_else(|| {
            ThreadError::InvalidState(format!("task {} is not running", task.id))
        })?;
        Ok(match join.await {
            Ok(Ok(value)) => TaskOutcome::completed(value),
            Ok(Err(e)) => TaskOutcome::failed(e.to_string()),
            Err(e) if e.is_cancelled() => TaskOutcome {
                status: super::task::TaskStatus::Cancelled,
                result: None,
                error: Some("task cancelled".into()),
            },
            Err(e) => TaskOutcome::failed(e.to_string()),
        })
    }

    async fn cancel(&self, task: &TaskHandle) -> Result<()> {
        if let Some(join) = self.take_running(&task.id)? {
            join.abort();
        }
        Ok(())
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
