//! Intent step: decide whether to reply and which tools matter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use super::prompts::{thought_prompt, thought_system};
use crate::agent::Agent;
use crate::error::Result;
use crate::generation::ModelClient;
use crate::tools::{ToolCategories, ToolParameters, BASE_CATEGORY};
use crate::types::{Message, UserMessage};

/// Whether the agent should answer the latest message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Intention {
    Ignore,
    Reply,
}

/// Per-turn decision record. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thought {
    pub intention: Intention,
    pub thought: String,
    /// Tool category the reply needs, if any.
    #[serde(default)]
    pub tools: Option<String>,
    #[serde(default)]
    pub recall_knowledge: bool,
}

impl Thought {
    pub fn should_reply(&self) -> bool {
        self.intention == Intention::Reply
    }

    /// Only the base category was selected.
    pub fn narrows_to_base(&self) -> bool {
        self.tools.as_deref() == Some(BASE_CATEGORY)
    }
}

/// JSON schema the intent model must answer with.
pub fn thought_schema(categories: &ToolCategories) -> Value {
    ToolParameters::object()
        .string_enum(
            "intention",
            "Ignore if last message is irrelevant, reply if relevant or criteria met.",
            &["ignore", "reply"],
            true,
        )
        .string(
            "thought",
            "A very brief thought about what relevance, if any, the last user message has to you, and a justification of your intention.",
            true,
        )
        .nullable_enum(
            "tools",
            "Which tools to include in reply context",
            &categories.names(),
        )
        .boolean(
            "recall_knowledge",
            "Whether to recall, refer to, or consult your knowledge base.",
            true,
        )
        .build()
        .schema
}

/// Run the intent step with one structured model call. `force_reply`
/// overrides the model's intention.
pub async fn think(
    client: &ModelClient,
    agent: &Agent,
    history: &[Message],
    incoming: &UserMessage,
    categories: &ToolCategories,
    force_reply: bool,
) -> Result<Thought> {
    let chat = render_chat_log(agent, history);
    let prompt = thought_prompt(agent, &chat, &render_line(incoming), categories);

    let mut thought: Thought = client
        .prompt_structured(
            vec![UserMessage::new(prompt).into()],
            Some(thought_system(agent)),
            &client.config().thinking_model,
            thought_schema(categories),
            "ChatThought",
        )
        .await?;

    if force_reply {
        thought.intention = Intention::Reply;
    }
    Ok(thought)
}

/// Decision used when the intent step is disabled: reply when the agent is
/// named in any incoming message or a reply is forced.
pub fn fallback_thought(agent: &Agent, incoming: &[UserMessage], force_reply: bool) -> Thought {
    let mentioned = regex::RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&agent.name)))
        .case_insensitive(true)
        .build()
        .map(|re| incoming.iter().any(|m| re.is_match(&m.content)))
        .unwrap_or(false);

    Thought {
        intention: if mentioned || force_reply {
            Intention::Reply
        } else {
            Intention::Ignore
        },
        thought: "none".to_string(),
        tools: Some(BASE_CATEGORY.to_string()),
        recall_knowledge: false,
    }
}

/// Flatten a transcript into `<name HH:MM> content` lines.
pub fn render_chat_log(agent: &Agent, messages: &[Message]) -> String {
    let mut chat = String::new();
    for msg in messages {
        let (name, content) = match msg {
            Message::User(user) => {
                let name = match user.name.as_deref() {
                    Some(name) if name == agent.name => "You",
                    Some(name) => name,
                    None => "User",
                };
                (name, with_attachments(user))
            }
            Message::Assistant(assistant) => {
                let mut content = assistant.content.clone();
                for call in &assistant.tool_calls {
                    let args = call
                        .args
                        .iter()
                        .map(|(k, v)| format!("{k}={}", render_arg(v)))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let result = call
                        .result
                        .clone()
                        .map(without_blurhash)
                        .unwrap_or(Value::Null);
                    content.push_str(&format!("\n -> {}({args}) -> {result}", call.tool));
                }
                (agent.name.as_str(), content)
            }
        };
        chat.push_str(&format!(
            "<{name} {}> {content}\n",
            msg.created_at().format("%H:%M")
        ));
    }
    chat
}

/// Render the incoming message as a single chat line.
pub fn render_line(message: &UserMessage) -> String {
    format!(
        "<{} {}> {}",
        message.name.as_deref().unwrap_or("User"),
        message.created_at.format("%H:%M"),
        with_attachments(message)
    )
}

fn with_attachments(message: &UserMessage) -> String {
    if message.attachments.is_empty() {
        message.content.clone()
    } else {
        format!(
            "{} (attachments: [{}])",
            message.content,
            message.attachments.join(", ")
        )
    }
}

fn render_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Drop bulky `blurhash` fields from tool results.
fn without_blurhash(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != "blurhash")
                .map(|(k, v)| (k, without_blurhash(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(without_blurhash).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssistantMessage, ToolCall};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};

    fn at(mut msg: UserMessage, h: u32, m: u32) -> UserMessage {
        msg.created_at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap();
        msg
    }

    #[test]
    fn chat_log_renders_names_attachments_and_tool_calls() {
        let agent = Agent::new("a1", "Eve");
        let mut args = Map::new();
        args.insert("prompt".into(), json!("a cat"));
        let mut call = ToolCall::new("txt2img", args);
        call.result = Some(json!({"output": [{"url": "cat.png", "blurhash": "xyz"}]}));
        let mut assistant = AssistantMessage::new("Here you go").with_tool_calls(vec![call]);
        assistant.created_at = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 9, 31, 0).unwrap();

        let messages: Vec<Message> = vec![
            at(UserMessage::new("draw a cat").with_name("Bob"), 9, 30).into(),
            assistant.into(),
            at(UserMessage::new("earlier note").with_name("Eve"), 9, 32).into(),
            at(UserMessage::new("look").with_attachments(vec!["a.png".into()]), 9, 33).into(),
        ];

        assert_eq!(
            render_chat_log(&agent, &messages),
            "<Bob 09:30> draw a cat\n\
             <Eve 09:31> Here you go\n -> txt2img(prompt=a cat) -> {\"output\":[{\"url\":\"cat.png\"}]}\n\
             <You 09:32> earlier note\n\
             <User 09:33> look (attachments: [a.png])\n"
        );
    }

    #[test]
    fn fallback_replies_only_on_word_mention_or_force() {
        let agent = Agent::new("a1", "Eve");
        let mention = [UserMessage::new("hey EVE, draw something")];
        let substring = [UserMessage::new("every day is nice")];

        assert!(fallback_thought(&agent, &mention, false).should_reply());
        assert!(!fallback_thought(&agent, &substring, false).should_reply());
        assert!(fallback_thought(&agent, &substring, true).should_reply());
        assert!(fallback_thought(&agent, &substring, false).narrows_to_base());
    }

    #[test]
    fn schema_lists_categories_and_null() {
        let schema = thought_schema(&ToolCategories::new().with("creation", "media"));
        assert_eq!(
            schema["properties"]["tools"]["enum"],
            json!(["base", "creation", null])
        );
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn thought_deserializes_from_model_json() {
        let thought: Thought = serde_json::from_value(json!({
            "intention": "ignore",
            "thought": "not for me",
            "tools": null,
            "recall_knowledge": false
        }))
        .unwrap();
        assert!(!thought.should_reply());
        assert!(!thought.narrows_to_base());
    }
}
