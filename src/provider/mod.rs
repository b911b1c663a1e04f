//! Model provider trait and implementations.

pub mod assembly;
pub mod format;
pub mod http;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "openai")]
pub mod openai;

pub use assembly::ToolCallAssembler;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{Result, ThreadError};
use crate::types::{FinishReason, Message, ModelEvent, ResponseFormat, ToolCall};

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub response_format: Option<ResponseFormat>,
    pub max_tokens: u32,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages,
            tools: Vec::new(),
            response_format: None,
            max_tokens: 8192,
        }
    }

    /// Schema name and body when structured output is requested.
    pub fn structured_schema(&self) -> Option<(&str, &Value)> {
        match &self.response_format {
            Some(ResponseFormat::JsonSchema { schema, name }) => Some((name.as_str(), schema)),
            _ => None,
        }
    }
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Response from a non-streaming call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
    /// Parsed value when structured output was requested.
    pub structured: Option<Value>,
}

impl ProviderResponse {
    pub fn stopped(&self) -> bool {
        self.finish_reason
            .is_some_and(FinishReason::is_natural_completion)
    }
}

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "anthropic").
    fn provider_name(&self) -> &str;

    /// Generate a complete response.
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse>;

    /// Stream a response. Transport and status errors are returned before
    /// the stream is handed back; the stream ends with exactly one
    /// [`ModelEvent::Stop`].
    async fn stream(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>>;
}

/// Pick the provider for a model id: `claude*` goes to Anthropic,
/// everything else to OpenAI.
pub fn create_provider(model: &str, config: &EngineConfig) -> Result<Arc<dyn ModelProvider>> {
    if model.starts_with("claude") {
        #[cfg(feature = "anthropic")]
        {
            let api_key = config
                .api_key("anthropic")
                .ok_or_else(|| ThreadError::Configuration("Missing ANTHROPIC_API_KEY".into()))?;
            return Ok(Arc::new(anthropic::AnthropicProvider::new(
                api_key.to_string(),
                config.base_url("anthropic").map(str::to_string),
            )));
        }
        #[cfg(not(feature = "anthropic"))]
        return Err(ThreadError::Configuration(format!(
            "model {model} needs the `anthropic` feature"
        )));
    }

    #[cfg(feature = "openai")]
    {
        let api_key = config
            .api_key("openai")
            .ok_or_else(|| ThreadError::Configuration("Missing OPENAI_API_KEY".into()))?;
        Ok(Arc::new(openai::OpenAiProvider::new(
            api_key.to_string(),
            config.base_url("openai").map(str::to_string),
        )))
    }
    #[cfg(not(feature = "openai"))]
    Err(ThreadError::Configuration(format!(
        "model {model} needs the `openai` feature"
    )))
}
