//! Thread titling.

use serde::Deserialize;

use super::prompts::{TITLE_REQUEST, TITLE_SYSTEM};
use crate::error::Result;
use crate::generation::ModelClient;
use crate::store::ThreadStore;
use crate::tools::ToolParameters;
use crate::types::{Message, ThreadId, UserMessage};

#[derive(Debug, Deserialize)]
struct TitleResponse {
    title: String,
}

fn title_schema() -> serde_json::Value {
    ToolParameters::object()
        .string(
            "title",
            "a phrase of 2-5 words (or up to 30 characters) that conveys the subject of the chat thread. It should be concise and terse, and not include any special characters or punctuation.",
            true,
        )
        .build()
        .schema
}

/// Ask the thinking model for a short title and store it. Returns the title,
/// or `None` when titling failed; failures are logged, never raised.
pub async fn title_thread(
    store: &dyn ThreadStore,
    client: &ModelClient,
    thread_id: ThreadId,
    extra_messages: Vec<UserMessage>,
) -> Option<String> {
    match try_title_thread(store, client, thread_id, extra_messages).await {
        Ok(title) => Some(title),
        Err(e) => {
            tracing::warn!(%thread_id, error = %e, "thread titling failed");
            None
        }
    }
}

async fn try_title_thread(
    store: &dyn ThreadStore,
    client: &ModelClient,
    thread_id: ThreadId,
    extra_messages: Vec<UserMessage>,
) -> Result<String> {
    let mut messages: Vec<Message> = store
        .load(thread_id)
        .await?
        .map(|thread| thread.messages)
        .unwrap_or_default();
    messages.extend(extra_messages.into_iter().map(Message::from));
    messages.push(UserMessage::new(TITLE_REQUEST).into());

    let response: TitleResponse = client
        .prompt_structured(
            messages,
            Some(TITLE_SYSTEM.to_string()),
            &client.config().thinking_model,
            title_schema(),
            "TitleResponse",
        )
        .await?;

    let title = response.title.trim().to_string();
    store.set_title(thread_id, title.clone()).await?;
    Ok(title)
}
