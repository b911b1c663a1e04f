//! Model invocation: provider routing, retry, and the unified event stream.

use std::sync::Arc;

use bon::Builder;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::config::EngineConfig;
use crate::error::{Result, ThreadError};
use crate::provider::{
    create_provider, ModelProvider, ProviderRequest, ProviderResponse, ToolDefinition,
};
use crate::types::{Message, ModelEvent, ModelOutput, ResponseFormat};
use crate::util::RetryPolicy;

type ProviderFactory = dyn Fn(&str) -> Result<Arc<dyn ModelProvider>> + Send + Sync;

/// One model invocation.
#[derive(Debug, Clone, Builder)]
pub struct ModelCall {
    #[builder(into)]
    pub model: String,
    #[builder(default)]
    pub messages: Vec<Message>,
    #[builder(into)]
    pub system: Option<String>,
    pub response_format: Option<ResponseFormat>,
    #[builder(default)]
    pub tools: Vec<ToolDefinition>,
}

/// Routes calls to a provider and guards them with a [`RetryPolicy`].
#[derive(Clone)]
pub struct ModelClient {
    config: Arc<EngineConfig>,
    providers: Arc<ProviderFactory>,
    retry: RetryPolicy,
}

impl ModelClient {
    /// Client that picks a provider per model id from the configured keys.
    pub fn new(config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let factory_config = config.clone();
        Self {
            config,
            providers: Arc::new(move |model: &str| create_provider(model, &factory_config)),
            retry: RetryPolicy::default(),
        }
    }

    /// Client that sends every model id to one provider.
    pub fn with_provider(config: EngineConfig, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            config: Arc::new(config),
            providers: Arc::new(move |_: &str| Ok(provider.clone())),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn request(&self, call: ModelCall) -> ProviderRequest {
        ProviderRequest {
            model: call.model,
            system: call.system,
            messages: call.messages,
            tools: call.tools,
            response_format: call.response_format,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Single-shot call returning content, tool-call drafts and the stop flag.
    pub async fn prompt(&self, call: ModelCall) -> Result<ModelOutput> {
        let response = self.generate(call).await?;
        Ok(ModelOutput {
            stop: response.stopped(),
            content: response.text,
            tool_calls: response.tool_calls,
        })
    }

    /// Streaming call. Opening the stream is retried; once events flow,
    /// errors are yielded to the consumer. Structured output cannot be
    /// streamed and is rejected before any request is made.
    pub async fn prompt_stream(
        &self,
        call: ModelCall,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>> {
        if call
            .response_format
            .as_ref()
            .is_some_and(ResponseFormat::is_structured)
        {
            return Err(ThreadError::Configuration(
                "structured output cannot be streamed".into(),
            ));
        }
        let provider = (self.providers)(&call.model)?;
        let request = self.request(call);
        self.retry.execute(|| provider.stream(&request)).await
    }

    /// Either mode as one event sequence. The non-streaming result becomes
    /// one content event, its tool calls, and one stop event.
    pub async fn events(
        &self,
        call: ModelCall,
        streaming: bool,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>> {
        if streaming {
            return self.prompt_stream(call).await;
        }
        let output = self.prompt(call).await?;
        Ok(stream::iter(output.into_events().into_iter().map(Ok)).boxed())
    }

    /// Retry-guarded raw provider response.
    pub(crate) async fn generate(&self, call: ModelCall) -> Result<ProviderResponse> {
        let provider = (self.providers)(&call.model)?;
        let request = self.request(call);
        self.retry.execute(|| provider.generate(&request)).await
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish()
    }
}
