//! Structured output: typed values from model responses.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::client::{ModelCall, ModelClient};
use crate::error::Result;
use crate::types::{Message, ResponseFormat};

impl ModelClient {
    /// Ask for a value matching `schema` and deserialize it into `T`.
    ///
    /// Providers that return the structured value directly are used as-is;
    /// otherwise the reply text is parsed as JSON.
    pub async fn prompt_structured<T: DeserializeOwned>(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        model: &str,
        schema: Value,
        name: &str,
    ) -> Result<T> {
        let call = ModelCall {
            model: model.to_string(),
            messages,
            system,
            response_format: Some(ResponseFormat::JsonSchema {
                schema,
                name: name.to_string(),
            }),
            tools: Vec::new(),
        };
        let response = self.generate(call).await?;
        let value = match response.structured {
            Some(value) => value,
            None => serde_json::from_str(&strip_code_fences(&response.text))?,
        };
        Ok(serde_json::from_value(value)?)
    }
}

/// Strip markdown code fences from a JSON reply.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let without_opening = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed);
        if let Some(stripped) = without_opening.strip_suffix("```") {
            return stripped.trim().to_string();
        }
        return without_opening.trim().to_string();
    }
    trimmed.to_string()
}
