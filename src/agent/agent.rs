//! Agent persona, knowledge, and reply criteria.

use serde::{Deserialize, Serialize};

/// When the agent's knowledge is worth recalling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeDescription {
    pub summary: String,
    pub retrieval_criteria: String,
}

/// The autonomous participant replying in a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub name: String,
    /// Identity and behavior instructions.
    #[serde(default)]
    pub persona: Option<String>,
    /// Long-term knowledge, recalled on demand.
    #[serde(default)]
    pub knowledge: Option<String>,
    #[serde(default)]
    pub knowledge_description: Option<KnowledgeDescription>,
    /// Guidance for the intent step on when to speak up.
    #[serde(default)]
    pub reply_criteria: Option<String>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            persona: None,
            knowledge: None,
            knowledge_description: None,
            reply_criteria: None,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_knowledge(
        mut self,
        knowledge: impl Into<String>,
        description: KnowledgeDescription,
    ) -> Self {
        self.knowledge = Some(knowledge.into());
        self.knowledge_description = Some(description);
        self
    }

    pub fn with_reply_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.reply_criteria = Some(criteria.into());
        self
    }

    pub fn has_knowledge(&self) -> bool {
        self.knowledge.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// System instruction for a conversation round. Knowledge is prepended
    /// only when requested and available.
    pub fn system_prompt(&self, recall_knowledge: bool) -> String {
        let identity = match &self.persona {
            Some(persona) => format!("You are {}.\n\n{}", self.name, persona),
            None => format!("You are {}.", self.name),
        };
        match self.knowledge.as_deref() {
            Some(knowledge) if recall_knowledge && self.has_knowledge() => {
                format!("<Knowledge>\n{knowledge}\n</Knowledge>\n\n{identity}")
            }
            _ => identity,
        }
    }
}

/// The human (or bot) prompting a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knowledge_is_prepended_only_when_recalled() {
        let agent = Agent::new("a1", "Eve").with_persona("A helpful artist.").with_knowledge(
            "Eve paints in oils.",
            KnowledgeDescription {
                summary: "painting facts".into(),
                retrieval_criteria: "questions about technique".into(),
            },
        );

        assert_eq!(agent.system_prompt(false), "You are Eve.\n\nA helpful artist.");
        let recalled = agent.system_prompt(true);
        assert!(recalled.starts_with("<Knowledge>\nEve paints in oils."));
        assert!(recalled.ends_with("A helpful artist."));
    }

    #[test]
    fn recall_without_knowledge_is_identity_only() {
        let agent = Agent::new("a1", "Eve");
        assert_eq!(agent.system_prompt(true), "You are Eve.");
    }
}
