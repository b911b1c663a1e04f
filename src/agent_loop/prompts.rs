//! Prompt text for the intent step and thread titling.

use crate::agent::Agent;
use crate::tools::ToolCategories;

pub const APOLOGY: &str = "I'm sorry, but something went wrong internally. Please try again later.";

pub const TITLE_SYSTEM: &str = "You are an expert at creating concise titles for chat threads.";
pub const TITLE_REQUEST: &str = "Come up with a title for this thread.";

pub fn thought_system(agent: &Agent) -> String {
    format!(
        "You analyze the chat on behalf of {} and generate a thought.",
        agent.name
    )
}

/// Intent-step prompt: the chat so far, the new message, and what the agent
/// could do about it.
pub fn thought_prompt(
    agent: &Agent,
    chat: &str,
    message: &str,
    categories: &ToolCategories,
) -> String {
    let tool_categories = categories
        .iter()
        .map(|(name, description)| format!("{name}: {description}"))
        .collect::<Vec<_>>()
        .join("\n");

    let knowledge = match &agent.knowledge_description {
        Some(d) if agent.has_knowledge() => format!(
            "<Knowledge>\nYou have a knowledge base. Summary: {}. Recall if: {}\n</Knowledge>\n\n",
            d.summary, d.retrieval_criteria
        ),
        _ => String::new(),
    };

    let reply_criteria = match &agent.reply_criteria {
        Some(criteria) => format!(
            "\nNote: You should additionally set reply to true if any of the following criteria are met: {criteria}\n"
        ),
        None => String::new(),
    };

    format!(
        "<Chat>\n{chat}</Chat>\n\n\
         <Tools>\nTool categories available to {name}:\n{tool_categories}\n</Tools>\n\n\
         {knowledge}\
         <Task>\nYou are {name}. Read the latest message below and decide whether to reply, \
         which tool category the reply needs, and whether your knowledge is relevant.\n\
         {reply_criteria}</Task>\n\n\
         <Message>\n{message}\n</Message>",
        name = agent.name,
    )
}
