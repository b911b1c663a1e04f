//! OpenAI Chat Completions API provider.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, ThreadError};
use crate::types::{FinishReason, Message, ModelEvent, ToolCall};

use super::assembly::ToolCallAssembler;
use super::format::{tool_call_id, tool_result_text, user_text};
use super::http::{bearer_headers, post_json, SseBuffer};
use super::{ModelProvider, ProviderRequest, ProviderResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn build_request_body(&self, request: &ProviderRequest, stream: bool) -> Value {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        for msg in &request.messages {
            messages.extend(message_to_openai(msg));
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "stream": stream,
        });

        if let Some(obj) = body.as_object_mut() {
            if !request.tools.is_empty() {
                let tool_defs: Vec<Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }

            if let Some((name, schema)) = request.structured_schema() {
                obj.insert(
                    "response_format".into(),
                    json!({
                        "type": "json_schema",
                        "json_schema": {
                            "name": name,
                            "schema": schema,
                            "strict": true,
                        }
                    }),
                );
            }
        }

        body
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let body = self.build_request_body(request, false);
        debug!(model = %request.model, "OpenAI generate");

        let resp = post_json(&self.url(), bearer_headers(&self.api_key), &body).await?;
        let data: OpenAiChatResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ThreadError::api(200, "No choices in OpenAI response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let args = serde_json::from_str::<Map<String, Value>>(&tc.function.arguments)
                    .unwrap_or_else(|e| {
                        warn!(tool = %tc.function.name, error = %e, "unparseable tool arguments");
                        Map::new()
                    });
                ToolCall::new(tc.function.name, args).with_id(tc.id)
            })
            .collect();

        let text = choice.message.content.unwrap_or_default();
        let structured = match request.structured_schema() {
            Some(_) => Some(serde_json::from_str::<Value>(&text)?),
            None => None,
        };

        Ok(ProviderResponse {
            text,
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_provider),
            structured,
        })
    }

    async fn stream(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>> {
        let body = self.build_request_body(request, true);
        debug!(model = %request.model, "OpenAI stream");

        let resp = post_json(&self.url(), bearer_headers(&self.api_key), &body).await?;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut sse = SseBuffer::new();
            let mut assembler = ToolCallAssembler::new();
            let mut finish: Option<FinishReason> = None;
            futures::pin_mut!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ThreadError::Network(e));
                        return;
                    }
                };

                for data in sse.push(&chunk) {
                    let chunk = match serde_json::from_str::<OpenAiStreamChunk>(&data) {
                        Ok(chunk) => chunk,
                        Err(_) => continue,
                    };
                    for choice in chunk.choices {
                        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                            yield Ok(ModelEvent::Token(text));
                        }
                        for delta in choice.delta.tool_calls.unwrap_or_default() {
                            let function = delta.function.unwrap_or_default();
                            assembler.push(
                                delta.index,
                                delta.id.as_deref(),
                                function.name.as_deref(),
                                function.arguments.as_deref(),
                            );
                        }
                        if let Some(reason) = choice.finish_reason {
                            finish = Some(FinishReason::from_provider(&reason));
                        }
                    }
                }
            }

            for call in assembler.finish() {
                yield Ok(ModelEvent::ToolCall(call));
            }
            yield Ok(ModelEvent::Stop(finish.unwrap_or(FinishReason::Other)));
        };

        Ok(Box::pin(stream))
    }
}

/// One transcript message becomes an assistant turn plus one `tool` message
/// per call, or a single user turn.
fn message_to_openai(msg: &Message) -> Vec<Value> {
    match msg {
        Message::User(user) => vec![json!({"role": "user", "content": user_text(user)})],
        Message::Assistant(assistant) if assistant.tool_calls.is_empty() => {
            vec![json!({"role": "assistant", "content": assistant.content})]
        }
        Message::Assistant(assistant) => {
            let tool_calls: Vec<Value> = assistant
                .tool_calls
                .iter()
                .enumerate()
                .map(|(i, call)| {
                    json!({
                        "id": tool_call_id(assistant, i, call),
                        "type": "function",
                        "function": {
                            "name": call.tool,
                            "arguments": Value::Object(call.args.clone()).to_string(),
                        }
                    })
                })
                .collect();
            let content = if assistant.content.is_empty() {
                Value::Null
            } else {
                Value::String(assistant.content.clone())
            };
            let mut out = vec![json!({
                "role": "assistant",
                "content": content,
                "tool_calls": tool_calls,
            })];
            out.extend(assistant.tool_calls.iter().enumerate().map(|(i, call)| {
                json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id(assistant, i, call),
                    "content": tool_result_text(call),
                })
            }));
            out
        }
    }
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize, Default)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}
