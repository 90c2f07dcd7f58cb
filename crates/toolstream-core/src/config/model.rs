use serde::{Deserialize, Serialize};

use crate::api::Usage;

pub const DEFAULT_CONTEXT_LENGTH: u64 = 128_000;

fn default_open_tag() -> String {
    "<think>".to_string()
}

fn default_close_tag() -> String {
    "</think>".to_string()
}

fn default_context_length() -> u64 {
    DEFAULT_CONTEXT_LENGTH
}

/// Delimiters of a reasoning preamble embedded in the content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningTags {
    #[serde(default = "default_open_tag")]
    pub open: String,
    #[serde(default = "default_close_tag")]
    pub close: String,
}

impl Default for ReasoningTags {
    fn default() -> Self {
        Self {
            open: default_open_tag(),
            close: default_close_tag(),
        }
    }
}

/// Configuration for a specific model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Identifier sent to the completion endpoint.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Alternative names accepted by the registry.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Context window in tokens.
    #[serde(default = "default_context_length")]
    pub context_length: u64,

    /// Whether to request a usage chunk at the end of each stream.
    #[serde(default)]
    pub include_usage_in_stream: bool,

    /// Set when the model opens its answers with a delimited reasoning preamble.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningTags>,

    /// Prepended to requests whose history has no system message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ModelConfig {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            aliases: Vec::new(),
            context_length: DEFAULT_CONTEXT_LENGTH,
            include_usage_in_stream: false,
            reasoning: None,
            system_prompt: None,
        }
    }

    pub fn with_reasoning(mut self, tags: ReasoningTags) -> Self {
        self.reasoning = Some(tags);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_usage_in_stream(mut self, enabled: bool) -> Self {
        self.include_usage_in_stream = enabled;
        self
    }

    pub fn with_context_length(mut self, context_length: u64) -> Self {
        self.context_length = context_length;
        self
    }

    /// Tokens left in the context window after a turn with `usage`.
    pub fn tokens_remaining(&self, usage: &Usage) -> u64 {
        self.context_length.saturating_sub(usage.total_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_table_defaults_to_think_tags() {
        let config: ModelConfig = toml::from_str(
            r#"
id = "deepseek-r1"
context_length = 64000

[reasoning]
"#,
        )
        .unwrap();

        assert_eq!(config.reasoning, Some(ReasoningTags::default()));
        assert_eq!(config.name, "");
        assert!(!config.include_usage_in_stream);
    }

    #[test]
    fn test_tokens_remaining_saturates() {
        let config = ModelConfig::new("m").with_context_length(100);
        let usage = Usage {
            prompt_tokens: 90,
            completion_tokens: 30,
            total_tokens: 120,
        };
        assert_eq!(config.tokens_remaining(&usage), 0);
        assert_eq!(config.tokens_remaining(&Usage::default()), 100);
    }
}
