//! # agentloop
//!
//! A streaming tool-calling orchestrator for OpenAI-compatible chat completion
//! endpoints.
//!
//! ## Overview
//!
//! Models that have no native function calling can still use tools if they
//! are told to answer with fenced JSON blocks:
//!
//! ````text
//! Let me look that up.
//! ```json
//! {"tool": "calendar_read", "arguments": {"date": "2024-05-02"}}
//! ```
//! ````
//!
//! This crate runs the loop around that convention. It streams a completion,
//! forwards text as it arrives, extracts the tool calls once the reply is
//! complete, executes them one after another through a [`ToolRegistry`],
//! feeds the results back into the conversation and asks again, until the
//! model answers without calling tools or the round budget is spent.
//!
//! ## Key Features
//!
//! - **Streaming**: every chunk is published as it arrives
//! - **Deterministic tools**: calls run sequentially, in the order they appear
//! - **Bounded**: at most `max_iterations` tool rounds per message (default 3)
//! - **Cancellable**: a [`CancellationToken`](tokio_util::sync::CancellationToken)
//!   is honoured at every suspension point, leaving history untouched for the
//!   interrupted round
//! - **Observable**: a single ordered [`EventStream`] of [`OrchestratorEvent`]s
//! - **Pluggable**: completion source, tool registry and prompt builder are traits
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentloop::{tool, Agent, AgentOptions, JsonObjectExt, OrchestratorEvent, Tools};
//! use agentloop::{describe_tools, ToolDescriptor};
//! use futures::StreamExt;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AgentOptions::builder()
//!         .model("qwen2.5-32b-instruct")
//!         .base_url("http://localhost:1234/v1")
//!         .build()?;
//!
//!     let tools = Tools::new().with(
//!         tool("calendar_read", "List events on a day (YYYY-MM-DD)")
//!             .param("date", "string")
//!             .build(|args| async move {
//!                 let date = args.str_field("date")?;
//!                 Ok(json!({"date": date, "events": ["09:00 standup"]}))
//!             }),
//!     )?;
//!
//!     let prompt = |tools: &[ToolDescriptor], _locale: &str| {
//!         format!(
//!             "Call tools with a ```json block holding {{\"tool\", \"arguments\"}}.\n{}",
//!             describe_tools(tools)
//!         )
//!     };
//!
//!     let agent = Agent::from_options(options, Arc::new(tools), Arc::new(prompt))?;
//!     let mut run = agent.submit("What's on my calendar today?").await;
//!
//!     while let Some(event) = run.events().next().await {
//!         match event {
//!             OrchestratorEvent::ResponseChunk(text) => print!("{}", text),
//!             OrchestratorEvent::ToolCall(name) => println!("\n[calling {}]", name),
//!             OrchestratorEvent::ResponseReplace(text) => println!("\n\n{}", text),
//!             OrchestratorEvent::Error(e) => eprintln!("error: {}", e),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **agent**: conversation owner, one active run at a time
//! - **orchestrator**: the request/stream/extract/execute loop
//! - **stream** / **sse**: completion sources and event-stream decoding
//! - **extract**: fenced JSON tool-call extraction
//! - **tools**: tool registry, tool definitions and schema normalisation
//! - **prompt**: system prompt seam
//! - **events**: ordered event channel
//! - **conversation**: messages, tool steps and the append-only history
//! - **context**: history window and token estimates
//! - **json**: JSON object helpers
//! - **types** / **config**: options, wire types and environment overrides
//! - **retry**: backoff when opening a completion stream
//! - **error**: error types

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Conversation owner that serialises runs and keeps shared history.
mod agent;

/// Local server presets and environment overrides for options.
mod config;

/// History window selection and character-based token estimates.
mod context;

/// Messages, tool steps and the append-only conversation container.
mod conversation;

/// Error types and the crate `Result` alias.
mod error;

/// Typed event channel between a run and its observers.
mod events;

/// Fenced JSON tool-call extraction from model replies.
mod extract;

/// JSON object alias and fallible field accessors.
mod json;

/// The request, stream, extract and execute loop.
mod orchestrator;

/// System prompt construction seam.
mod prompt;

/// Server-Sent Events decoding of completion bodies.
mod sse;

/// Completion source trait and HTTP implementation.
mod stream;

/// Tool registry trait, tool definitions and schema normalisation.
mod tools;

/// Agent options, builder and completion wire types.
mod types;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Retry utilities with exponential backoff and jitter.
pub mod retry;

pub use retry::RetryConfig;

// --- Agent & Orchestration ---

pub use agent::{Agent, RunHandle};
pub use orchestrator::{Orchestrator, ROUND_LIMIT_STATUS, RunOutcome, Session};

// --- Events ---

pub use events::{EventSender, EventStream, OrchestratorEvent, channel as event_channel};

// --- Conversation Model ---

pub use conversation::{Conversation, ConversationItem, Message, Role, ToolStep, ToolStepStatus};

// --- Tool Calls & Tools ---

pub use extract::{Extraction, ToolCall, extract};
pub use tools::{
    Tool, ToolBuilder, ToolDescriptor, ToolExecutionResult, ToolHandler, ToolRegistry, Tools, tool,
};

// --- Prompt ---

pub use prompt::{PromptBuilder, StaticPrompt, describe_tools};

// --- Completion Streams ---

pub use sse::{DONE_SENTINEL, decode_event_stream};
pub use stream::{CompletionSource, HttpCompletionClient, TextStream};

// --- Configuration ---

pub use config::{
    ENV_API_KEY, ENV_BASE_URL, ENV_HISTORY_WINDOW, ENV_MAX_ITERATIONS, ENV_MODEL, ENV_PROVIDER,
    ENV_TOOL_RESULT_ROLE, Provider,
};
pub use types::{
    AgentOptions, AgentOptionsBuilder, ChatMessage, ChatRequest, StreamChoice, StreamChunk,
    StreamDelta,
};

// --- Context Management ---

pub use context::{estimate_request_tokens, estimate_tokens, is_approaching_limit, recent_messages};

// --- JSON ---

pub use json::{JsonObject, JsonObjectExt, into_object, to_details};

// --- Error Handling ---

pub use error::{Error, Result, ToolError};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module containing the most commonly used types and functions.
/// Import with `use agentloop::prelude::*;`.
pub mod prelude {
    pub use crate::{
        Agent, AgentOptions, AgentOptionsBuilder, Conversation, Error, JsonObject, JsonObjectExt,
        Message, Orchestrator, OrchestratorEvent, PromptBuilder, Result, Role, RunOutcome,
        StaticPrompt, Tool, ToolDescriptor, ToolRegistry, Tools, tool,
    };
}
