//! Tool-call dispatch in bounded concurrent batches.

use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::events::ThreadUpdate;
use crate::error::{Result, ThreadError};
use crate::store::ThreadStore;
use crate::tools::{
    Creation, CreationRegistrar, TaskHandle, TaskOutcome, Tool, ToolContext, ToolRegistry,
};
use crate::types::{AssistantMessage, MessageId, ThreadId, ToolCall, ToolCallPatch};

/// Default number of tool calls run concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 4;

struct StartedCall {
    index: usize,
    tool_name: String,
    tool: Arc<dyn Tool>,
    task: TaskHandle,
}

/// Runs an assistant message's tool calls and reports one update per call.
///
/// Calls are split into consecutive batches. Every call of a batch is
/// started before any of them is awaited, and the next batch begins only
/// when the whole batch has finished. Within a batch, updates arrive in
/// completion order. A failing call never affects its siblings.
#[derive(Clone)]
pub struct ToolDispatcher {
    store: Arc<dyn ThreadStore>,
    registry: ToolRegistry,
    creations: Option<Arc<dyn CreationRegistrar>>,
    batch_size: usize,
    announce_starts: bool,
}

impl ToolDispatcher {
    pub fn new(store: Arc<dyn ThreadStore>, registry: ToolRegistry) -> Self {
        Self {
            store,
            registry,
            creations: None,
            batch_size: DEFAULT_BATCH_SIZE,
            announce_starts: false,
        }
    }

    pub fn with_creations(mut self, creations: Option<Arc<dyn CreationRegistrar>>) -> Self {
        self.creations = creations;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Emit [`ThreadUpdate::ToolCallStarted`] once each task is running.
    pub fn announce_starts(mut self, announce: bool) -> Self {
        self.announce_starts = announce;
        self
    }

    /// Dispatch every tool call of `message`, which must already be stored
    /// in `thread_id`.
    pub fn dispatch<'a>(
        &'a self,
        thread_id: ThreadId,
        message: &'a AssistantMessage,
        ctx: &'a ToolContext,
    ) -> impl Stream<Item = ThreadUpdate> + Send + 'a {
        async_stream::stream! {
            let calls: Vec<(usize, &ToolCall)> = message.tool_calls.iter().enumerate().collect();

            for (batch, chunk) in calls.chunks(self.batch_size).enumerate() {
                debug!(%thread_id, batch, size = chunk.len(), "dispatching tool batch");

                let starts = join_all(
                    chunk
                        .iter()
                        .map(|(index, call)| self.start_call(thread_id, message.id, *index, call, ctx)),
                )
                .await;

                let mut waiting = FuturesUnordered::new();
                for start in starts {
                    match start {
                        Ok(started) => {
                            if self.announce_starts {
                                yield ThreadUpdate::ToolCallStarted {
                                    tool_name: started.tool_name.clone(),
                                    tool_index: started.index,
                                    task: started.task.id.clone(),
                                };
                            }
                            waiting.push(self.finish_call(thread_id, message.id, started));
                        }
                        Err(update) => {
                            yield update;
                        }
                    }
                }

                while let Some(update) = waiting.next().await {
                    yield update;
                }
            }
        }
    }

    async fn start_call(
        &self,
        thread_id: ThreadId,
        message_id: MessageId,
        index: usize,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> std::result::Result<StartedCall, ThreadUpdate> {
        let attempt = async {
            let tool = self
                .registry
                .get(&call.tool)
                .cloned()
                .ok_or_else(|| ThreadError::ToolNotFound(call.tool.clone()))?;
            let task = tool.start(ctx, &call.args).await?;
            self.store
                .update_tool_call(
                    thread_id,
                    message_id,
                    index,
                    ToolCallPatch::running(task.id.clone()),
                )
                .await?;
            Ok::<_, ThreadError>(StartedCall {
                index,
                tool_name: call.tool.clone(),
                tool,
                task,
            })
        };

        match attempt.await {
            Ok(started) => Ok(started),
            Err(e) => Err(self.fail_call(thread_id, message_id, index, &call.tool, e).await),
        }
    }

    async fn finish_call(
        &self,
        thread_id: ThreadId,
        message_id: MessageId,
        started: StartedCall,
    ) -> ThreadUpdate {
        let StartedCall {
            index,
            tool_name,
            tool,
            task,
        } = started;

        let attempt = async {
            let outcome = tool.wait(&task).await?;
            self.store
                .update_tool_call(thread_id, message_id, index, outcome.to_patch())
                .await?;
            Ok::<_, ThreadError>(outcome)
        };

        match attempt.await {
            Ok(outcome) if outcome.is_completed() => {
                self.register_creation(&task, &outcome).await;
                debug!(%thread_id, tool = %tool_name, index, task = %task.id, "tool call completed");
                ThreadUpdate::ToolComplete {
                    tool_name,
                    tool_index: index,
                    result: outcome.result.unwrap_or(Value::Null),
                }
            }
            Ok(outcome) => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| format!("task ended with status {}", outcome.status));
                let failure = ThreadError::ToolReportedFailure {
                    tool_name: tool_name.clone(),
                    message: message.clone(),
                };
                warn!(%thread_id, index, task = %task.id, error = %failure, "tool task failed");
                ThreadUpdate::tool_error(tool_name, index, message)
            }
            Err(e) => self.fail_call(thread_id, message_id, index, &tool_name, e).await,
        }
    }

    /// Record an unexpected failure on the call and build its error update.
    async fn fail_call(
        &self,
        thread_id: ThreadId,
        message_id: MessageId,
        index: usize,
        tool_name: &str,
        err: ThreadError,
    ) -> ThreadUpdate {
        let message = err.to_string();
        warn!(%thread_id, tool = tool_name, index, error = %message, "tool call failed");
        if let Err(persist) = self
            .store
            .update_tool_call(thread_id, message_id, index, ToolCallPatch::failed(&message))
            .await
        {
            error!(%thread_id, tool = tool_name, index, error = %persist, "could not record tool failure");
        }
        ThreadUpdate::tool_error(tool_name, index, message)
    }

    async fn register_creation(&self, task: &TaskHandle, outcome: &TaskOutcome) {
        let Some(registrar) = &self.creations else {
            return;
        };
        let Some((filename, media)) = outcome.media_output() else {
            return;
        };
        let result: Result<()> = registrar
            .register(Creation::from_task(task, filename, media))
            .await;
        if let Err(e) = result {
            warn!(task = %task.id, tool = %task.tool, error = %e, "creation registration failed");
        }
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("registry", &self.registry)
            .field("batch_size", &self.batch_size)
            .field("announce_starts", &self.announce_starts)
            .finish()
    }
}
