//! System prompt construction
//!
//! Prompt templates live outside this crate. The orchestrator only asks a
//! [`PromptBuilder`] for the system prompt at the start of every round,
//! handing it the available tools and the configured locale. Closures with
//! the matching signature implement the trait directly.

use crate::tools::ToolDescriptor;

/// Produces the system prompt for a completion request
pub trait PromptBuilder: Send + Sync {
    fn system_prompt(&self, tools: &[ToolDescriptor], locale: &str) -> String;
}

impl<F> PromptBuilder for F
where
    F: Fn(&[ToolDescriptor], &str) -> String + Send + Sync,
{
    fn system_prompt(&self, tools: &[ToolDescriptor], locale: &str) -> String {
        self(tools, locale)
    }
}

/// A fixed prompt that ignores tools and locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPrompt(pub String);

impl StaticPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self(prompt.into())
    }
}

impl PromptBuilder for StaticPrompt {
    fn system_prompt(&self, _tools: &[ToolDescriptor], _locale: &str) -> String {
        self.0.clone()
    }
}

/// Plain-text tool catalogue, one line per tool with its JSON parameter schema.
///
/// Convenience for prompt builders that want the conventional listing:
///
/// ```text
/// - calendar_read: List events on a day. Parameters: {"type":"object",...}
/// ```
pub fn describe_tools(tools: &[ToolDescriptor]) -> String {
    tools
        .iter()
        .map(|t| format!("- {}: {} Parameters: {}", t.name, t.description, t.parameters))
        .collect::<Vec<_>>()
        .join("\n")
}
