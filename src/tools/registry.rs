//! Tool registry, categories and base-set narrowing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::tool::Tool;
use crate::provider::ToolDefinition;

/// Name of the category holding everyday tools.
pub const BASE_CATEGORY: &str = "base";

/// Named groups of tools the intent step can pick from, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCategories {
    entries: Vec<(String, String)>,
}

impl Default for ToolCategories {
    fn default() -> Self {
        Self {
            entries: vec![(
                BASE_CATEGORY.to_string(),
                "Everyday tools for text, search and simple media".to_string(),
            )],
        }
    }
}

impl ToolCategories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a category description.
    pub fn with(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let description = description.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = description,
            None => self.entries.push((name, description)),
        }
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d.as_str()))
    }
}

/// Shared mapping of tool name to implementation.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    base: BTreeSet<String>,
    categories: ToolCategories,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool outside the base set.
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Register a tool and mark it as part of the base set.
    pub fn register_base(mut self, tool: Arc<dyn Tool>) -> Self {
        self.base.insert(tool.name().to_string());
        self.register(tool)
    }

    pub fn with_categories(mut self, categories: ToolCategories) -> Self {
        self.categories = categories;
        self
    }

    pub fn categories(&self) -> &ToolCategories {
        &self.categories
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn is_base(&self, name: &str) -> bool {
        self.base.contains(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Restrict to the base set plus any tool already called in the
    /// transcript, so multi-step tool chains keep their tools.
    pub fn narrowed_to_base<'a>(
        &'a self,
        already_called: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut keep: BTreeSet<&str> = self.base.iter().map(String::as_str).collect();
        keep.extend(already_called);
        Self {
            tools: self
                .tools
                .iter()
                .filter(|(name, _)| keep.contains(name.as_str()))
                .map(|(name, tool)| (name.clone(), tool.clone()))
                .collect(),
            base: self.base.clone(),
            categories: self.categories.clone(),
        }
    }

    /// Definitions sent to model providers.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("base", &self.base)
            .field("categories", &self.categories)
            .finish()
    }
}
