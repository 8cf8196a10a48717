//! The agent loop
//!
//! One call to [`Orchestrator::run`] drives a session through
//!
//! ```text
//! Requesting -> Streaming -> Extracting -> (Executing -> Appending -> Requesting)* -> done
//! ```
//!
//! A round requests a completion over the recent history, forwards every
//! streamed chunk as [`OrchestratorEvent::ResponseChunk`], and scans the full
//! reply for fenced tool calls. Without calls the cleaned reply is final.
//! With calls each one is executed in textual order, one at a time, and the
//! loop asks again, for at most `max_iterations` rounds.
//!
//! History only changes at round boundaries. Tool outcomes are staged while a
//! round runs and committed together with the assistant text once the round is
//! complete, so a cancelled or failed round leaves no trace in the session.
//!
//! Each run ends with exactly one terminal signal: a
//! [`OrchestratorEvent::ResponseReplace`], a single
//! [`OrchestratorEvent::Error`], or silence when cancelled.

use crate::context::{estimate_request_tokens, recent_messages};
use crate::conversation::{Conversation, ConversationItem, Message, Role, ToolStep, ToolStepStatus};
use crate::events::{EventSender, OrchestratorEvent};
use crate::extract::{ToolCall, extract};
use crate::error::ToolError;
use crate::json::{JsonObject, to_details};
use crate::prompt::PromptBuilder;
use crate::retry::retry_with_backoff;
use crate::stream::{CompletionSource, HttpCompletionClient};
use crate::tools::{ToolDescriptor, ToolRegistry};
use crate::types::{AgentOptions, ChatMessage, ChatRequest};
use crate::{Error, Result};
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Status text emitted when the round budget is spent
pub const ROUND_LIMIT_STATUS: &str = "tool round limit reached";

/// Mutable state of one orchestration run
#[derive(Debug)]
pub struct Session {
    /// Conversation so far; changes only at round boundaries
    pub history: Conversation,
    /// Completed tool rounds
    pub iteration: u32,
    pub max_iterations: u32,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(history: Conversation, max_iterations: u32) -> Self {
        Self {
            history,
            iteration: 0,
            max_iterations,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, so the run can be cancelled from elsewhere.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The model answered without requesting tools
    Completed(String),
    /// The round budget ran out; carries the last assistant text
    IterationLimit(String),
    Cancelled,
    Failed(Error),
}

impl RunOutcome {
    /// Final assistant text, if the run produced one.
    pub fn text(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed(text) | RunOutcome::IterationLimit(text) => Some(text),
            RunOutcome::Cancelled | RunOutcome::Failed(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }
}

/// Result of a single round
enum Round {
    /// No tool calls; the cleaned reply
    Final(String),
    /// Tool calls were executed
    Tools {
        text: String,
        staged: Vec<ConversationItem>,
    },
    Cancelled,
}

/// Drives completions, tool execution and re-prompting
pub struct Orchestrator {
    options: AgentOptions,
    source: Arc<dyn CompletionSource>,
    tools: Arc<dyn ToolRegistry>,
    prompt: Arc<dyn PromptBuilder>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        options: AgentOptions,
        source: Arc<dyn CompletionSource>,
        tools: Arc<dyn ToolRegistry>,
        prompt: Arc<dyn PromptBuilder>,
    ) -> Self {
        Self {
            options,
            source,
            tools,
            prompt,
        }
    }

    /// Orchestrator backed by the HTTP completion client.
    pub fn with_http(
        options: AgentOptions,
        tools: Arc<dyn ToolRegistry>,
        prompt: Arc<dyn PromptBuilder>,
    ) -> Result<Self> {
        let source = Arc::new(HttpCompletionClient::new(&options)?);
        Ok(Self::new(options, source, tools, prompt))
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// A fresh session over `history` using the configured round budget.
    pub fn session(&self, history: Conversation) -> Session {
        Session::new(history, self.options.max_iterations)
    }

    /// Completion request for the current state of `history`.
    ///
    /// The system prompt comes first, followed by the most recent
    /// `history_window` messages that have content.
    pub fn build_request(&self, history: &Conversation, tools: &[ToolDescriptor]) -> ChatRequest {
        let system_prompt = self.prompt.system_prompt(tools, &self.options.locale);

        let window = recent_messages(history, self.options.history_window);
        let mut messages = Vec::with_capacity(window.len() + 1);
        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::new(Role::System, system_prompt));
        }
        messages.extend(window.into_iter().map(ChatMessage::from));

        ChatRequest {
            messages,
            model: self.options.model.clone(),
            stream: true,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        }
    }

    /// Run the loop until the model answers, the budget is spent, the session
    /// is cancelled, or a request fails.
    pub async fn run(&self, session: &mut Session, events: &EventSender) -> RunOutcome {
        let tools = self.tools.descriptors();

        loop {
            if session.is_cancelled() {
                log::debug!("run cancelled before round {}", session.iteration + 1);
                return RunOutcome::Cancelled;
            }

            let round = match self.round(session, &tools, events).await {
                Ok(round) => round,
                Err(e) => {
                    log::warn!("run failed in round {}: {}", session.iteration + 1, e);
                    events.emit(OrchestratorEvent::Error(e.to_string()));
                    return RunOutcome::Failed(e);
                }
            };

            match round {
                Round::Cancelled => {
                    log::debug!("run cancelled during round {}", session.iteration + 1);
                    return RunOutcome::Cancelled;
                }
                Round::Final(text) => {
                    session.history.push(Message::assistant(text.clone()));
                    events.emit(OrchestratorEvent::ResponseReplace(text.clone()));
                    return RunOutcome::Completed(text);
                }
                Round::Tools { text, staged } => {
                    session.history.extend(staged);
                    session.history.push(Message::assistant(text.clone()));
                    session.iteration += 1;

                    if session.iteration >= session.max_iterations {
                        log::info!("stopping after {} tool rounds", session.iteration);
                        events.emit(OrchestratorEvent::Status(ROUND_LIMIT_STATUS.to_string()));
                        events.emit(OrchestratorEvent::ResponseReplace(text.clone()));
                        return RunOutcome::IterationLimit(text);
                    }
                }
            }
        }
    }

    async fn round(
        &self,
        session: &Session,
        tools: &[ToolDescriptor],
        events: &EventSender,
    ) -> Result<Round> {
        let cancel = &session.cancel;
        let request = self.build_request(&session.history, tools);
        log::debug!(
            "round {}: {} messages, ~{} tokens",
            session.iteration + 1,
            request.messages.len(),
            estimate_request_tokens(&request.messages)
        );
        events.emit(OrchestratorEvent::Status(format!(
            "requesting completion (round {} of {})",
            session.iteration + 1,
            session.max_iterations
        )));

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Round::Cancelled),
            opened = retry_with_backoff(&self.options.retry, || self.source.stream(&request)) => opened?,
        };

        let mut buffer = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Round::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    events.emit(OrchestratorEvent::ResponseChunk(chunk.clone()));
                    buffer.push_str(&chunk);
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }
        drop(stream);

        let extraction = extract(&buffer);
        if !extraction.has_calls() {
            return Ok(Round::Final(extraction.visible_text));
        }

        log::debug!(
            "round {}: {} tool calls",
            session.iteration + 1,
            extraction.calls.len()
        );

        let mut staged = Vec::with_capacity(extraction.calls.len() * 2);
        for call in extraction.calls {
            if cancel.is_cancelled() {
                return Ok(Round::Cancelled);
            }

            events.emit(OrchestratorEvent::ToolCall(call.tool.clone()));
            events.emit(OrchestratorEvent::ToolArguments(call.arguments_value()));
            events.emit(OrchestratorEvent::ToolExecuting(call.tool.clone()));

            let execution = AssertUnwindSafe(self.tools.execute(&call.tool, call.arguments.clone()))
                .catch_unwind();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Round::Cancelled),
                outcome = execution => outcome.unwrap_or_else(|panic| {
                    let message = panic_message(&*panic);
                    log::error!("tool '{}' panicked: {}", call.tool, message);
                    Err(ToolError::failed(&call.tool, format!("panicked: {}", message)))
                }),
            };

            match outcome {
                Ok(result) => {
                    events.emit(OrchestratorEvent::ToolResult(Value::Object(result.clone())));
                    staged.extend(self.tool_success(&call, result));
                }
                Err(e) => {
                    events.emit(OrchestratorEvent::Error(e.to_string()));
                    staged.extend(self.tool_failure(&call, &e.message()));
                }
            }
        }

        Ok(Round::Tools {
            text: extraction.visible_text,
            staged,
        })
    }

    fn tool_success(&self, call: &ToolCall, result: JsonObject) -> [ConversationItem; 2] {
        let result = Value::Object(result);
        let text = format!("Tool '{}' returned: {}", call.tool, result);
        let details = step_details(call, "result", result);

        [
            ToolStep::new(ToolStepStatus::Result, call.tool.clone(), details).into(),
            Message::new(self.options.tool_result_role, text).into(),
        ]
    }

    fn tool_failure(&self, call: &ToolCall, message: &str) -> [ConversationItem; 2] {
        let details = step_details(call, "error", Value::String(message.to_string()));

        [
            ToolStep::new(ToolStepStatus::Error, call.tool.clone(), details).into(),
            Message::new(
                self.options.tool_result_role,
                format!("Tool '{}' failed: {}", call.tool, message),
            )
            .into(),
        ]
    }
}

/// `arguments` plus one outcome entry, flattened for a [`ToolStep`].
fn step_details(call: &ToolCall, key: &str, value: Value) -> BTreeMap<String, String> {
    let mut details = JsonObject::new();
    details.insert("arguments".to_string(), call.arguments_value());
    details.insert(key.to_string(), value);
    to_details(&details)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
