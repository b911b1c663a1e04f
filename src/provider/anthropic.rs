//! Anthropic Messages API provider.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, ThreadError};
use crate::types::{FinishReason, Message, ModelEvent, ToolCall};

use super::assembly::ToolCallAssembler;
use super::format::{tool_call_id, tool_result_is_error, tool_result_text, user_text};
use super::http::{anthropic_headers, post_json, SseBuffer};
use super::{ModelProvider, ProviderRequest, ProviderResponse};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn url(&self) -> String {
        format!("{}/messages", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn build_request_body(&self, request: &ProviderRequest, stream: bool) -> Value {
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg {
                Message::User(user) => messages.push(json!({
                    "role": "user",
                    "content": user_text(user),
                })),
                Message::Assistant(assistant) => {
                    let mut content = Vec::new();
                    if !assistant.content.is_empty() {
                        content.push(json!({"type": "text", "text": assistant.content}));
                    }
                    for (i, call) in assistant.tool_calls.iter().enumerate() {
                        content.push(json!({
                            "type": "tool_use",
                            "id": tool_call_id(assistant, i, call),
                            "name": call.tool,
                            "input": call.args,
                        }));
                    }
                    if content.is_empty() {
                        continue;
                    }
                    messages.push(json!({"role": "assistant", "content": content}));

                    if !assistant.tool_calls.is_empty() {
                        let results: Vec<Value> = assistant
                            .tool_calls
                            .iter()
                            .enumerate()
                            .map(|(i, call)| {
                                json!({
                                    "type": "tool_result",
                                    "tool_use_id": tool_call_id(assistant, i, call),
                                    "content": tool_result_text(call),
                                    "is_error": tool_result_is_error(call),
                                })
                            })
                            .collect();
                        messages.push(json!({"role": "user", "content": results}));
                    }
                }
            }
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "stream": stream,
        });

        let mut tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();

        if let Some(obj) = body.as_object_mut() {
            if let Some(ref system) = request.system {
                obj.insert("system".into(), system.clone().into());
            }
            if let Some((name, schema)) = request.structured_schema() {
                tools.push(json!({
                    "name": name,
                    "description": "Respond with a value matching this schema.",
                    "input_schema": schema,
                }));
                obj.insert("tool_choice".into(), json!({"type": "tool", "name": name}));
            }
            if !tools.is_empty() {
                obj.insert("tools".into(), tools.into());
            }
        }

        body
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let body = self.build_request_body(request, false);
        debug!(model = %request.model, "Anthropic generate");

        let resp = post_json(&self.url(), anthropic_headers(&self.api_key, API_VERSION), &body)
            .await?;
        let data: AnthropicResponse = resp.json().await?;
        let structured_name = request.structured_schema().map(|(name, _)| name);

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut structured = None;

        for block in data.content {
            match block.r#type.as_str() {
                "text" => {
                    if let Some(text) = block.text {
                        texts.push(text);
                    }
                }
                "tool_use" => {
                    let (Some(id), Some(name)) = (block.id, block.name) else {
                        continue;
                    };
                    let input = block.input.unwrap_or_else(|| json!({}));
                    if Some(name.as_str()) == structured_name {
                        structured = Some(input);
                        continue;
                    }
                    let args = match input {
                        Value::Object(map) => map,
                        _ => Default::default(),
                    };
                    tool_calls.push(ToolCall::new(name, args).with_id(id));
                }
                _ => {}
            }
        }

        if structured_name.is_some() && structured.is_none() {
            return Err(ThreadError::Provider {
                provider: "anthropic".into(),
                message: "structured response missing from reply".into(),
            });
        }

        Ok(ProviderResponse {
            text: texts.join(". "),
            tool_calls,
            finish_reason: data.stop_reason.as_deref().map(FinishReason::from_provider),
            structured,
        })
    }

    async fn stream(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>> {
        let body = self.build_request_body(request, true);
        debug!(model = %request.model, "Anthropic stream");

        let resp = post_json(&self.url(), anthropic_headers(&self.api_key, API_VERSION), &body)
            .await?;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut sse = SseBuffer::new();
            let mut assembler = ToolCallAssembler::new();
            let mut finish: Option<FinishReason> = None;
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ThreadError::Network(e));
                        return;
                    }
                };

                for data in sse.push(&chunk) {
                    let event: AnthropicStreamEvent = match serde_json::from_str(&data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::trace!(error = %e, "skipping unrecognised stream event");
                            continue;
                        }
                    };
                    match event {
                        AnthropicStreamEvent::ContentBlockStart { index, content_block } => {
                            if content_block.r#type == "tool_use" {
                                assembler.push(
                                    index,
                                    content_block.id.as_deref(),
                                    content_block.name.as_deref(),
                                    None,
                                );
                            }
                        }
                        AnthropicStreamEvent::ContentBlockDelta { index, delta } => {
                            match delta {
                                AnthropicDelta::TextDelta { text } => {
                                    if !text.is_empty() {
                                        yield Ok(ModelEvent::Token(text));
                                    }
                                }
                                AnthropicDelta::InputJsonDelta { partial_json } => {
                                    assembler.push(index, None, None, Some(&partial_json));
                                }
                                AnthropicDelta::Other => {}
                            }
                        }
                        AnthropicStreamEvent::ContentBlockStop { index } => {
                            if let Some(call) = assembler.take(index) {
                                yield Ok(ModelEvent::ToolCall(call));
                            }
                        }
                        AnthropicStreamEvent::MessageDelta { delta } => {
                            if let Some(reason) = delta.stop_reason {
                                finish = Some(FinishReason::from_provider(&reason));
                            }
                        }
                        AnthropicStreamEvent::MessageStop => break 'read,
                        AnthropicStreamEvent::Error { error } => {
                            yield Err(ThreadError::Provider {
                                provider: "anthropic".into(),
                                message: error.message,
                            });
                            return;
                        }
                        AnthropicStreamEvent::Other => {}
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

// Internal Anthropic response types

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    r#type: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockStart {
        index: usize,
        content_block: AnthropicContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: AnthropicDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: AnthropicMessageDelta,
    },
    MessageStop,
    Error {
        error: AnthropicErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicMessageDelta {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    message: String,
}
