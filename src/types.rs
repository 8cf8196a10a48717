//! Agent configuration and completion wire types

use crate::conversation::{Message, Role};
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Options for configuring an agent
#[derive(Clone)]
pub struct AgentOptions {
    /// Model name sent with every completion request
    pub model: String,

    /// OpenAI-compatible endpoint URL (without `/chat/completions`)
    pub base_url: String,

    /// API key (empty means no `Authorization` header)
    pub api_key: String,

    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,

    /// Maximum tokens to generate (None uses provider default)
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Maximum request/extract/execute rounds per run
    pub max_iterations: u32,

    /// Number of most recent messages sent with each request
    pub history_window: usize,

    /// Role under which tool results are fed back to the model
    pub tool_result_role: Role,

    /// Locale handed to the prompt builder
    pub locale: String,

    /// Buffered events per run before slow consumers start losing the oldest ones
    pub event_capacity: usize,

    /// Retry policy for opening a completion stream
    pub retry: RetryConfig,
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_iterations", &self.max_iterations)
            .field("history_window", &self.history_window)
            .field("tool_result_role", &self.tool_result_role)
            .field("locale", &self.locale)
            .field("event_capacity", &self.event_capacity)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            base_url: String::new(),
            api_key: String::new(),
            temperature: 0.7,
            max_tokens: None,
            timeout: 60,
            max_iterations: 3,
            history_window: 10,
            tool_result_role: Role::User,
            locale: "en".to_string(),
            event_capacity: 256,
            retry: RetryConfig::disabled(),
        }
    }
}

impl AgentOptions {
    /// Create a new builder for AgentOptions
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }
}

/// Builder for AgentOptions
#[derive(Debug, Default, Clone)]
pub struct AgentOptionsBuilder {
    pub(crate) model: Option<String>,
    pub(crate) base_url: Option<String>,
    pub(crate) api_key: Option<String>,
    pub(crate) temperature: Option<f32>,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) timeout: Option<u64>,
    pub(crate) max_iterations: Option<u32>,
    pub(crate) history_window: Option<usize>,
    pub(crate) tool_result_role: Option<Role>,
    pub(crate) locale: Option<String>,
    pub(crate) event_capacity: Option<usize>,
    pub(crate) retry: Option<RetryConfig>,
}

impl AgentOptionsBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    pub fn history_window(mut self, messages: usize) -> Self {
        self.history_window = Some(messages);
        self
    }

    pub fn tool_result_role(mut self, role: Role) -> Self {
        self.tool_result_role = Some(role);
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> crate::Result<AgentOptions> {
        let defaults = AgentOptions::default();

        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| crate::Error::config("model is required"))?;

        let base_url = self
            .base_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| crate::Error::config("base_url is required"))?;

        let temperature = self.temperature.unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(crate::Error::config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }

        let max_iterations = self.max_iterations.unwrap_or(defaults.max_iterations);
        if max_iterations == 0 {
            return Err(crate::Error::config("max_iterations must be at least 1"));
        }

        let history_window = self.history_window.unwrap_or(defaults.history_window);
        if history_window == 0 {
            return Err(crate::Error::config("history_window must be at least 1"));
        }

        let event_capacity = self.event_capacity.unwrap_or(defaults.event_capacity);
        if event_capacity == 0 {
            return Err(crate::Error::config("event_capacity must be at least 1"));
        }

        Ok(AgentOptions {
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.unwrap_or_default(),
            temperature,
            max_tokens: self.max_tokens,
            timeout: self.timeout.unwrap_or(defaults.timeout),
            max_iterations,
            history_window,
            tool_result_role: self.tool_result_role.unwrap_or(defaults.tool_result_role),
            locale: self.locale.unwrap_or(defaults.locale),
            event_capacity,
            retry: self.retry.unwrap_or(defaults.retry),
        })
    }
}

/// Chat message in completion request format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Streaming chat-completion request body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub stream: bool,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// One `data:` payload of the completion event stream
///
/// Only the fields the orchestrator reads are modelled; everything else in
/// the payload is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Concatenated text content of all choices, if any.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .choices
            .iter()
            .filter_map(|c| c.delta.content.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }
}
