//! Conversation front-end
//!
//! [`Agent`] owns the conversation history and runs one orchestration at a
//! time. Submitting a new message while a run is active cancels that run and
//! waits for it to unwind before the history is touched, so there is never
//! more than one writer.
//!
//! ```rust,no_run
//! use agentloop::{Agent, AgentOptions, OrchestratorEvent, StaticPrompt, Tools};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> agentloop::Result<()> {
//! let options = AgentOptions::builder()
//!     .model("qwen2.5-32b-instruct")
//!     .base_url("http://localhost:1234/v1")
//!     .build()?;
//!
//! let agent = Agent::from_options(
//!     options,
//!     Arc::new(Tools::new()),
//!     Arc::new(StaticPrompt::new("You are a helpful assistant.")),
//! )?;
//!
//! let mut run = agent.submit("What's on my calendar today?").await;
//! while let Some(event) = run.events().next().await {
//!     if let OrchestratorEvent::ResponseChunk(text) = event {
//!         print!("{}", text);
//!     }
//! }
//! println!("\n{:?}", run.wait().await);
//! # Ok(())
//! # }
//! ```

use crate::conversation::{Conversation, Message};
use crate::events::{self, EventStream};
use crate::orchestrator::{Orchestrator, RunOutcome};
use crate::prompt::PromptBuilder;
use crate::tools::ToolRegistry;
use crate::types::AgentOptions;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveRun {
    /// Cancel and wait for the task to finish writing back history.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            log::warn!("previous run ended abnormally: {}", e);
        }
    }
}

/// Handle to a submitted run
pub struct RunHandle {
    events: EventStream,
    cancel: CancellationToken,
    outcome: oneshot::Receiver<RunOutcome>,
}

impl RunHandle {
    /// Events of this run. The stream ends when the run is over.
    pub fn events(&mut self) -> &mut EventStream {
        &mut self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> RunOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => RunOutcome::Failed(Error::other("run ended without reporting an outcome")),
        }
    }

    /// Split into the event stream and the outcome.
    pub fn into_parts(self) -> (EventStream, oneshot::Receiver<RunOutcome>) {
        (self.events, self.outcome)
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A conversation with at most one active run
pub struct Agent {
    orchestrator: Arc<Orchestrator>,
    history: Arc<Mutex<Conversation>>,
    active: Mutex<Option<ActiveRun>>,
}

impl Agent {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self::with_history(orchestrator, Conversation::new())
    }

    /// Resume a stored conversation.
    pub fn with_history(orchestrator: Orchestrator, history: Conversation) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            history: Arc::new(Mutex::new(history)),
            active: Mutex::new(None),
        }
    }

    /// Agent talking to the configured HTTP endpoint.
    pub fn from_options(
        options: AgentOptions,
        tools: Arc<dyn ToolRegistry>,
        prompt: Arc<dyn PromptBuilder>,
    ) -> Result<Self> {
        Ok(Self::new(Orchestrator::with_http(options, tools, prompt)?))
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Append a user message and start a run for it.
    ///
    /// Any active run is cancelled first and awaited. Its events end before
    /// this run's start, and the rounds it completed stay in the history.
    pub async fn submit(&self, text: impl Into<String>) -> RunHandle {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            log::debug!("cancelling active run before new submission");
            previous.stop().await;
        }

        let snapshot = {
            let mut history = self.history.lock().await;
            history.push(Message::user(text));
            history.clone()
        };

        let (sender, events) = events::channel(self.orchestrator.options().event_capacity);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let orchestrator = self.orchestrator.clone();
        let history = self.history.clone();
        let mut session = orchestrator
            .session(snapshot)
            .with_cancel_token(cancel.clone());

        let handle = tokio::spawn(async move {
            let outcome = orchestrator.run(&mut session, &sender).await;
            *history.lock().await = session.history;
            drop(sender);
            let _ = outcome_tx.send(outcome);
        });

        *active = Some(ActiveRun {
            cancel: cancel.clone(),
            handle,
        });

        RunHandle {
            events,
            cancel,
            outcome: outcome_rx,
        }
    }

    /// Cancel the active run, if any, without waiting for it.
    pub async fn cancel(&self) {
        if let Some(run) = self.active.lock().await.as_ref() {
            run.cancel.cancel();
        }
    }

    /// Whether a run is still in progress.
    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Snapshot of the conversation. While a run is active this is the
    /// history as it stood when that run started.
    pub async fn history(&self) -> Conversation {
        self.history.lock().await.clone()
    }

    /// Stop any active run and forget the conversation.
    pub async fn clear_history(&self) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.stop().await;
        }
        self.history.lock().await.clear();
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
