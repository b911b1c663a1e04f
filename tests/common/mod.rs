//! Shared test helpers: scripted provider, recording tools, fixtures.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde_json::{json, Map, Value};

use threadloop::config::EngineConfig;
use threadloop::error::{Result, ThreadError};
use threadloop::generation::ModelClient;
use threadloop::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use threadloop::tools::{TaskHandle, TaskOutcome, Tool, ToolContext, ToolParameters};
use threadloop::types::{FinishReason, ModelEvent, ToolCall};
use threadloop::util::RetryPolicy;

enum Scripted {
    Response(ProviderResponse),
    Stream(Vec<Result<ModelEvent>>),
    Error(ThreadError),
}

/// Provider answering from a queue of canned replies, recording requests.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, item: Scripted) {
        self.script.lock().unwrap().push_back(item);
    }

    /// A final text answer.
    pub fn push_text(&self, text: &str) {
        self.push(Scripted::Response(ProviderResponse {
            text: text.to_string(),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }));
    }

    /// A round that requests tool calls.
    pub fn push_tool_calls(&self, text: &str, calls: Vec<ToolCall>) {
        self.push(Scripted::Response(ProviderResponse {
            text: text.to_string(),
            tool_calls: calls,
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }));
    }

    /// A structured reply, as returned for a schema request.
    pub fn push_structured(&self, value: Value) {
        self.push(Scripted::Response(ProviderResponse {
            structured: Some(value),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }));
    }

    pub fn push_stream(&self, events: Vec<ModelEvent>) {
        self.push(Scripted::Stream(events.into_iter().map(Ok).collect()));
    }

    /// A stream that fails after the given events.
    pub fn push_broken_stream(&self, events: Vec<ModelEvent>, error: ThreadError) {
        let mut items: Vec<Result<ModelEvent>> = events.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.push(Scripted::Stream(items));
    }

    pub fn push_error(&self, error: ThreadError) {
        self.push(Scripted::Error(error));
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next(&self, request: &ProviderRequest) -> Option<Scripted> {
        self.requests.lock().unwrap().push(request.clone());
        self.script.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        match self.next(request) {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(e)) => Err(e),
            Some(Scripted::Stream(_)) => Err(ThreadError::InvalidState(
                "scripted a stream but generate was called".into(),
            )),
            None => Ok(ProviderResponse {
                text: "Mock response".to_string(),
                finish_reason: Some(FinishReason::Stop),
                ..Default::default()
            }),
        }
    }

    async fn stream(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>> {
        match self.next(request) {
            Some(Scripted::Stream(items)) => Ok(stream::iter(items).boxed()),
            Some(Scripted::Error(e)) => Err(e),
            Some(Scripted::Response(_)) => Err(ThreadError::InvalidState(
                "scripted a response but stream was called".into(),
            )),
            None => Ok(stream::iter(vec![Ok(ModelEvent::Stop(FinishReason::Stop))]).boxed()),
        }
    }
}

/// Client routing every model to `provider`, without retry delays.
pub fn client(config: EngineConfig, provider: Arc<ScriptedProvider>) -> ModelClient {
    ModelClient::with_provider(config, provider).with_retry_policy(RetryPolicy::none())
}

pub fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn call(tool: &str, value: Value) -> ToolCall {
    ToolCall::new(tool, args(value))
}

/// Tool whose tasks sleep for `args.delay_ms` and echo `args.n`. Every
/// start and finish is written to a shared log.
pub struct RecordingTool {
    name: String,
    parameters: ToolParameters,
    log: Arc<Mutex<Vec<String>>>,
    fail_start: bool,
    fail_task: bool,
}

impl RecordingTool {
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            parameters: ToolParameters::object()
                .number("n", "sequence number", true)
                .number("delay_ms", "how long the task runs", false)
                .build(),
            log,
            fail_start: false,
            fail_task: false,
        }
    }

    /// Starting a task fails.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Tasks start but report failure.
    pub fn failing_task(mut self) -> Self {
        self.fail_task = true;
        self
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "records its lifecycle"
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn start(&self, ctx: &ToolContext, args: &Map<String, Value>) -> Result<TaskHandle> {
        let n = args.get("n").and_then(Value::as_u64).unwrap_or(0);
        if self.fail_start {
            self.record(format!("reject {n}"));
            return Err(ThreadError::tool(&self.name, "backend unavailable"));
        }
        self.record(format!("start {n}"));
        Ok(TaskHandle {
            id: format!("task-{n}"),
            tool: self.name.clone(),
            user: ctx.user_id.clone(),
            requester: ctx.agent_id.clone(),
            args: args.clone(),
        })
    }

    async fn wait(&self, task: &TaskHandle) -> Result<TaskOutcome> {
        let n = task.args.get("n").and_then(Value::as_u64).unwrap_or(0);
        let delay = task.args.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.record(format!("done {n}"));
        if self.fail_task {
            return Ok(TaskOutcome::failed(format!("task {n} crashed")));
        }
        Ok(TaskOutcome::completed(json!({ "n": n })))
    }
}

pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn log_entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}
