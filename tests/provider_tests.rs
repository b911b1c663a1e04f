//! HTTP-level tests for the OpenAI and Anthropic adapters.

#![cfg(all(feature = "openai", feature = "anthropic"))]

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use threadloop::config::EngineConfig;
use threadloop::error::ThreadError;
use threadloop::generation::{ModelCall, ModelClient};
use threadloop::provider::anthropic::AnthropicProvider;
use threadloop::provider::openai::OpenAiProvider;
use threadloop::provider::{ModelProvider, ProviderRequest};
use threadloop::types::{FinishReason, Message, ModelEvent, UserMessage};
use threadloop::util::retry::{RetryPolicy, RetryTier};

fn request(model: &str) -> ProviderRequest {
    ProviderRequest::new(model, vec![UserMessage::new("hello").into()])
}

fn sse(events: &[serde_json::Value]) -> String {
    let mut body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[tokio::test]
async fn openai_generate_reads_text_and_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": "Let me look",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "web_search", "arguments": "{\"q\":\"rust\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()));
    let response = provider.generate(&request("gpt-4o")).await.unwrap();

    assert_eq!(response.text, "Let me look");
    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
    assert!(!response.stopped());
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].id.as_deref(), Some("call_1"));
    assert_eq!(response.tool_calls[0].tool, "web_search");
    assert_eq!(response.tool_calls[0].args["q"], "rust");
}

#[tokio::test]
async fn openai_stream_assembles_fragmented_arguments() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"choices": [{"delta": {"content": "Hel"}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {"content": "lo"}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {"tool_calls": [{
            "index": 0, "id": "call_9",
            "function": {"name": "lookup", "arguments": "{\"id\":"}
        }]}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {"tool_calls": [{
            "index": 0, "function": {"arguments": " 42}"}
        }]}, "finish_reason": null}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()));
    let events: Vec<ModelEvent> = provider
        .stream(&request("gpt-4o"))
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    assert_eq!(events.len(), 4);
    assert_eq!(events[0], ModelEvent::Token("Hel".into()));
    assert_eq!(events[1], ModelEvent::Token("lo".into()));
    match &events[2] {
        ModelEvent::ToolCall(call) => {
            assert_eq!(call.tool, "lookup");
            assert_eq!(call.id.as_deref(), Some("call_9"));
            assert_eq!(call.args["id"], 42);
        }
        other => panic!("expected tool call, got {other:?}"),
    }
    assert_eq!(events[3], ModelEvent::Stop(FinishReason::ToolCalls));
}

#[tokio::test]
async fn openai_stream_without_finish_reason_still_stops() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(event_stream(sse(&[json!({
            "choices": [{"delta": {"content": "partial"}, "finish_reason": null}]
        })])))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()));
    let events: Vec<ModelEvent> = provider
        .stream(&request("gpt-4o"))
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            ModelEvent::Token("partial".into()),
            ModelEvent::Stop(FinishReason::Other),
        ]
    );
}

#[tokio::test]
async fn anthropic_generate_joins_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("ak-test".into(), Some(server.uri()));
    let response = provider
        .generate(&request("claude-3-5-sonnet-20241022"))
        .await
        .unwrap();

    assert_eq!(response.text, "Hello. world");
    assert!(response.stopped());
    assert!(response.tool_calls.is_empty());
}

#[tokio::test]
async fn anthropic_stream_emits_tool_calls_on_block_stop() {
    let server = MockServer::start().await;
    let frames = [
        ("message_start", json!({"type": "message_start", "message": {"id": "msg_1"}})),
        ("content_block_start", json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}})),
        ("content_block_delta", json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Checking"}})),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
        ("content_block_start", json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {}}})),
        ("content_block_delta", json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"id\": "}})),
        ("content_block_delta", json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "7}"}})),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 1})),
        ("message_delta", json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}})),
        ("message_stop", json!({"type": "message_stop"})),
    ];
    let body: String = frames
        .iter()
        .map(|(name, data)| format!("event: {name}\ndata: {data}\n\n"))
        .collect();
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("ak-test".into(), Some(server.uri()));
    let events: Vec<ModelEvent> = provider
        .stream(&request("claude-3-5-sonnet-20241022"))
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], ModelEvent::Token("Checking".into()));
    match &events[1] {
        ModelEvent::ToolCall(call) => {
            assert_eq!(call.tool, "lookup");
            assert_eq!(call.id.as_deref(), Some("toolu_1"));
            assert_eq!(call.args["id"], 7);
        }
        other => panic!("expected tool call, got {other:?}"),
    }
    assert_eq!(events[2], ModelEvent::Stop(FinishReason::ToolCalls));
}

#[tokio::test]
async fn too_many_requests_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": {"retry_after": 1.5}})),
        )
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key".into(), Some(server.uri()));
    let err = provider.generate(&request("gpt-4o")).await.unwrap_err();
    assert!(matches!(
        err,
        ThreadError::RateLimited {
            retry_after_ms: Some(1500)
        }
    ));
    assert!(err.is_rate_limit());
}

#[tokio::test]
async fn client_retries_server_errors_and_routes_by_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "recovered"}],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = EngineConfig::default()
        .with_api_key("anthropic", "ak-test")
        .with_base_url("anthropic", server.uri());
    let quick = RetryPolicy::none().with_tier(RetryTier {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        ..RetryTier::transient()
    });
    let client = ModelClient::new(config).with_retry_policy(quick);

    let output = client
        .prompt(
            ModelCall::builder()
                .model("claude-3-5-sonnet-20241022")
                .messages(vec![Message::from(UserMessage::new("hi"))])
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(output.content, "recovered");
    assert!(output.stop);
}

#[tokio::test]
async fn structured_prompt_requests_a_strict_schema() {
    #[derive(Debug, Deserialize)]
    struct Title {
        title: String,
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": "TitleResponse", "strict": true}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"content": "{\"title\": \"Cat pictures\"}"},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = EngineConfig::default()
        .with_api_key("openai", "test-key")
        .with_base_url("openai", server.uri());
    let client = ModelClient::new(config).with_retry_policy(RetryPolicy::none());

    let title: Title = client
        .prompt_structured(
            vec![UserMessage::new("title this").into()],
            None,
            "gpt-4o-mini",
            json!({"type": "object", "properties": {"title": {"type": "string"}}}),
            "TitleResponse",
        )
        .await
        .unwrap();
    assert_eq!(title.title, "Cat pictures");
}

#[tokio::test]
async fn structured_output_cannot_be_streamed() {
    let client = ModelClient::new(EngineConfig::default().with_api_key("openai", "k"));
    let call = ModelCall::builder()
        .model("gpt-4o")
        .response_format(threadloop::types::ResponseFormat::JsonSchema {
            schema: json!({}),
            name: "X".into(),
        })
        .build();
    let err = client.prompt_stream(call).await.err().unwrap();
    assert!(matches!(err, ThreadError::Configuration(_)));
}
