//! Configuration helpers
//!
//! Well-known local server presets and environment overrides for
//! [`AgentOptionsBuilder`].
//!
//! | Variable | Builder field |
//! |---|---|
//! | `AGENTLOOP_BASE_URL` | `base_url` |
//! | `AGENTLOOP_PROVIDER` | `base_url` from a [`Provider`] preset, unless `AGENTLOOP_BASE_URL` is set |
//! | `AGENTLOOP_MODEL` | `model` |
//! | `AGENTLOOP_API_KEY` | `api_key` |
//! | `AGENTLOOP_MAX_ITERATIONS` | `max_iterations` |
//! | `AGENTLOOP_HISTORY_WINDOW` | `history_window` |
//! | `AGENTLOOP_TOOL_RESULT_ROLE` | `tool_result_role` (`user`, `assistant` or `system`) |
//!
//! Empty values count as unset.
//!
//! ```rust,no_run
//! use agentloop::{AgentOptions, Provider};
//!
//! # fn main() -> agentloop::Result<()> {
//! let options = AgentOptions::builder()
//!     .provider(Provider::Ollama)
//!     .model("qwen2.5:7b")
//!     .apply_env(|key| std::env::var(key).ok())?
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::conversation::Role;
use crate::types::AgentOptionsBuilder;
use crate::{Error, Result};
use std::env;
use std::str::FromStr;

pub const ENV_BASE_URL: &str = "AGENTLOOP_BASE_URL";
pub const ENV_PROVIDER: &str = "AGENTLOOP_PROVIDER";
pub const ENV_MODEL: &str = "AGENTLOOP_MODEL";
pub const ENV_API_KEY: &str = "AGENTLOOP_API_KEY";
pub const ENV_MAX_ITERATIONS: &str = "AGENTLOOP_MAX_ITERATIONS";
pub const ENV_HISTORY_WINDOW: &str = "AGENTLOOP_HISTORY_WINDOW";
pub const ENV_TOOL_RESULT_ROLE: &str = "AGENTLOOP_TOOL_RESULT_ROLE";

/// Local OpenAI-compatible servers with known default endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LMStudio,
    Ollama,
    LlamaCpp,
    VLLM,
}

impl Provider {
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::LMStudio => "http://localhost:1234/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::LlamaCpp => "http://localhost:8080/v1",
            Provider::VLLM => "http://localhost:8000/v1",
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(Provider::LMStudio),
            "ollama" => Ok(Provider::Ollama),
            "llamacpp" | "llama-cpp" | "llama_cpp" | "llama.cpp" => Ok(Provider::LlamaCpp),
            "vllm" => Ok(Provider::VLLM),
            other => Err(Error::config(format!("unknown provider '{}'", other))),
        }
    }
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(Error::config(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}

impl AgentOptionsBuilder {
    /// Use a provider's default endpoint as the base URL.
    pub fn provider(self, provider: Provider) -> Self {
        self.base_url(provider.default_url())
    }

    /// Builder seeded from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| env::var(key).ok())
    }

    /// Override fields from `lookup`, which maps variable names to values.
    ///
    /// Values already set on the builder are replaced by any variable that is
    /// present. Unparseable values are configuration errors.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BASE_URL) {
            self = self.base_url(url);
        } else if let Some(provider) = get(ENV_PROVIDER) {
            self = self.provider(provider.parse()?);
        }

        if let Some(model) = get(ENV_MODEL) {
            self = self.model(model);
        }

        if let Some(key) = get(ENV_API_KEY) {
            self = self.api_key(key);
        }

        if let Some(raw) = get(ENV_MAX_ITERATIONS) {
            self = self.max_iterations(parse_positive(ENV_MAX_ITERATIONS, &raw)?);
        }

        if let Some(raw) = get(ENV_HISTORY_WINDOW) {
            self = self.history_window(parse_positive(ENV_HISTORY_WINDOW, &raw)?);
        }

        if let Some(raw) = get(ENV_TOOL_RESULT_ROLE) {
            let role = Role::parse(&raw).ok_or_else(|| {
                Error::config(format!(
                    "{} must be one of user, assistant, system; got '{}'",
                    ENV_TOOL_RESULT_ROLE, raw
                ))
            })?;
            self = self.tool_result_role(role);
        }

        Ok(self)
    }
}
