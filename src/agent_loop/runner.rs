//! Thread orchestration: one prompt turn from incoming messages to the
//! final update.

use std::sync::Arc;

use futures::{pin_mut, Stream, StreamExt};

use super::dispatch::ToolDispatcher;
use super::events::ThreadUpdate;
use super::prompts::APOLOGY;
use super::rate_limit::ChatRateLimiter;
use super::thinking::{fallback_thought, think, Thought};
use crate::agent::{Agent, User};
use crate::config::{EngineConfig, PromptOptions};
use crate::error::{Result, ThreadError};
use crate::generation::{ModelCall, ModelClient};
use crate::store::ThreadStore;
use crate::tools::{CreationRegistrar, ToolContext, ToolRegistry};
use crate::types::{
    ActiveChange, AssistantMessage, Message, MessageId, ModelEvent, ThreadId, UserMessage,
};

/// Drives prompt turns against a thread store, a model client and a set of
/// tools.
#[derive(Clone)]
pub struct ThreadRunner {
    client: ModelClient,
    store: Arc<dyn ThreadStore>,
    tools: ToolRegistry,
    rate_limiter: Option<Arc<dyn ChatRateLimiter>>,
    creations: Option<Arc<dyn CreationRegistrar>>,
}

impl ThreadRunner {
    pub fn new(client: ModelClient, store: Arc<dyn ThreadStore>, tools: ToolRegistry) -> Self {
        Self {
            client,
            store,
            tools,
            rate_limiter: None,
            creations: None,
        }
    }

    /// Consulted when `use_rate_limits` is on.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn ChatRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Receives media produced by completed tool calls.
    pub fn with_creations(mut self, registrar: Arc<dyn CreationRegistrar>) -> Self {
        self.creations = Some(registrar);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        self.client.config()
    }

    pub fn store(&self) -> &Arc<dyn ThreadStore> {
        &self.store
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn for `messages` (oldest first) and report its progress.
    ///
    /// A turn that replies yields `StartPrompt`, then one or more rounds of
    /// tokens, assistant messages and tool updates, then `EndPrompt`. A turn
    /// the agent ignores yields nothing. Failures surface as
    /// [`ThreadUpdate::Error`] and never escape the stream.
    pub fn prompt_thread<'a>(
        &'a self,
        user: &'a User,
        agent: &'a Agent,
        thread_id: ThreadId,
        messages: Vec<UserMessage>,
        options: PromptOptions,
    ) -> impl Stream<Item = ThreadUpdate> + Send + 'a {
        async_stream::stream! {
            let config = self.client.config();
            let Some(last) = messages.last().cloned() else {
                tracing::warn!(%thread_id, "prompt without messages ignored");
                return;
            };

            if config.use_rate_limits {
                match &self.rate_limiter {
                    Some(limiter) => {
                        if let Err(e) = limiter.check_chat_rate_limit(&user.id).await {
                            tracing::warn!(
                                %thread_id,
                                user = %user.id,
                                error = %e,
                                suggestion = ?e.recovery_suggestion(),
                                "prompt rejected"
                            );
                            yield ThreadUpdate::rejected(e.to_string());
                            return;
                        }
                    }
                    None => {
                        tracing::warn!(%thread_id, "rate limits enabled but no limiter attached");
                    }
                }
            }

            if options.user_is_bot {
                tracing::debug!(%thread_id, user = %user.id, "ignoring prompt from bot");
                return;
            }

            let thought = self.decide(agent, thread_id, &messages, &last, options.force_reply).await;
            tracing::debug!(
                %thread_id,
                intention = %thought.intention,
                tools = ?thought.tools,
                recall_knowledge = thought.recall_knowledge,
                thought = %thought.thought,
                "prompt_thought"
            );

            let incoming: Vec<Message> = messages.into_iter().map(Message::from).collect();
            if !thought.should_reply() {
                if let Err(e) = self.store.append(thread_id, incoming, ActiveChange::None).await {
                    tracing::error!(%thread_id, error = %e, "could not store ignored messages");
                    yield ThreadUpdate::rejected(e.to_string());
                }
                return;
            }

            if let Err(e) = self
                .store
                .append(thread_id, incoming, ActiveChange::Activate(last.id))
                .await
            {
                tracing::error!(%thread_id, error = %e, "could not store incoming messages");
                yield ThreadUpdate::rejected(e.to_string());
                return;
            }

            yield ThreadUpdate::StartPrompt;

            let model = options.model_or(config).to_string();
            let ctx = ToolContext::new(user.id.as_str(), agent.id.as_str());
            let mut round = 0usize;

            loop {
                round += 1;
                if round > config.max_rounds {
                    let err = ThreadError::InvalidState(format!(
                        "turn exceeded {} rounds",
                        config.max_rounds
                    ));
                    yield self.abort_turn(agent, thread_id, last.id, err).await;
                    break;
                }

                let (call, tools) = match self.prepare_round(agent, thread_id, &thought, &model).await {
                    Ok(prepared) => prepared,
                    Err(e) => {
                        yield self.abort_turn(agent, thread_id, last.id, e).await;
                        break;
                    }
                };

                let events = match self.client.events(call, options.stream).await {
                    Ok(events) => events,
                    Err(e) => {
                        yield self.abort_turn(agent, thread_id, last.id, e).await;
                        break;
                    }
                };
                pin_mut!(events);

                let mut content = String::new();
                let mut tool_calls = Vec::new();
                let mut stop = true;
                let mut failure = None;
                while let Some(event) = events.next().await {
                    match event {
                        Ok(ModelEvent::Token(text)) => {
                            if text.is_empty() {
                                continue;
                            }
                            if options.stream {
                                yield ThreadUpdate::AssistantToken { text: text.clone() };
                            }
                            content.push_str(&text);
                        }
                        Ok(ModelEvent::ToolCall(call)) => tool_calls.push(call),
                        Ok(ModelEvent::Stop(reason)) => stop = reason.is_natural_completion(),
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                if let Some(e) = failure {
                    yield self.abort_turn(agent, thread_id, last.id, e).await;
                    break;
                }

                let mut reply = AssistantMessage::new(content)
                    .with_tool_calls(tool_calls)
                    .replying_to(last.id);
                reply.name = Some(agent.name.clone());

                let change = if stop {
                    ActiveChange::Deactivate(last.id)
                } else {
                    ActiveChange::None
                };
                if let Err(e) = self
                    .store
                    .append(thread_id, vec![reply.clone().into()], change)
                    .await
                {
                    yield self.abort_turn(agent, thread_id, last.id, e).await;
                    break;
                }
                tracing::debug!(
                    %thread_id,
                    round,
                    stop,
                    content_len = reply.content.len(),
                    tool_calls = reply.tool_calls.len(),
                    "prompt_out"
                );
                yield ThreadUpdate::AssistantMessage { message: reply.clone() };

                if !reply.tool_calls.is_empty() {
                    let dispatcher = ToolDispatcher::new(self.store.clone(), tools)
                        .with_creations(self.creations.clone())
                        .with_batch_size(config.tool_batch_size)
                        .announce_starts(options.announce_tool_starts);
                    let updates = dispatcher.dispatch(thread_id, &reply, &ctx);
                    pin_mut!(updates);
                    while let Some(update) = updates.next().await {
                        yield update;
                    }
                }

                if stop {
                    break;
                }
            }

            yield ThreadUpdate::EndPrompt;
        }
    }

    /// Intent step, or the keyword fallback when it is disabled or fails.
    async fn decide(
        &self,
        agent: &Agent,
        thread_id: ThreadId,
        messages: &[UserMessage],
        last: &UserMessage,
        force_reply: bool,
    ) -> Thought {
        let config = self.client.config();
        if !config.use_thinking {
            return fallback_thought(agent, messages, force_reply);
        }

        let history = match self.store.recent_messages(thread_id, config.history_limit).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(%thread_id, error = %e, "history unavailable for intent step");
                Vec::new()
            }
        };
        match think(
            &self.client,
            agent,
            &history,
            last,
            self.tools.categories(),
            force_reply,
        )
        .await
        {
            Ok(thought) => thought,
            Err(e) => {
                tracing::warn!(%thread_id, error = %e, "intent step failed, using fallback");
                fallback_thought(agent, messages, force_reply)
            }
        }
    }

    /// Load the history window and pick the tools offered this round.
    async fn prepare_round(
        &self,
        agent: &Agent,
        thread_id: ThreadId,
        thought: &Thought,
        model: &str,
    ) -> Result<(ModelCall, ToolRegistry)> {
        let history = self
            .store
            .recent_messages(thread_id, self.client.config().history_limit)
            .await?;

        let tools = if thought.narrows_to_base() {
            self.tools.narrowed_to_base(
                history
                    .iter()
                    .flat_map(|m| m.tool_calls().iter().map(|c| c.tool.as_str())),
            )
        } else {
            self.tools.clone()
        };

        tracing::debug!(
            %thread_id,
            model,
            messages = history.len(),
            tools = ?tools.names(),
            "prompt_in"
        );

        let call = ModelCall::builder()
            .model(model)
            .messages(history)
            .system(agent.system_prompt(thought.recall_knowledge))
            .tools(tools.definitions())
            .build();
        Ok((call, tools))
    }

    /// Store the apology, clear the active marker and build the error update.
    async fn abort_turn(
        &self,
        agent: &Agent,
        thread_id: ThreadId,
        reply_to: MessageId,
        err: ThreadError,
    ) -> ThreadUpdate {
        tracing::error!(
            %thread_id,
            error = %err,
            category = ?err.category(),
            suggestion = ?err.recovery_suggestion(),
            "prompt turn failed"
        );
        let mut apology = AssistantMessage::new(APOLOGY).replying_to(reply_to);
        apology.name = Some(agent.name.clone());
        if let Err(e) = self
            .store
            .append(
                thread_id,
                vec![apology.clone().into()],
                ActiveChange::Deactivate(reply_to),
            )
            .await
        {
            tracing::error!(%thread_id, error = %e, "could not store apology");
        }
        ThreadUpdate::turn_error(apology, err.to_string())
    }
}

impl std::fmt::Debug for ThreadRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadRunner")
            .field("tools", &self.tools)
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish()
    }
}
