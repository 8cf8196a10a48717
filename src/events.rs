//! Orchestrator events
//!
//! Every observable step of a run is published as an [`OrchestratorEvent`] on
//! a bounded broadcast channel. Events arrive in the order they were emitted.
//! A consumer that falls more than the channel capacity behind loses the
//! oldest events (a warning is logged) but never blocks the run.
//!
//! The stream ends once the run finishes and its [`EventSender`] is dropped.

use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    /// Progress note, e.g. a new round starting
    Status(String),
    /// A tool call was recognised
    ToolCall(String),
    /// Arguments of the preceding tool call
    ToolArguments(Value),
    /// The tool is now running
    ToolExecuting(String),
    /// The tool finished; its result object
    ToolResult(Value),
    /// Streamed text as it arrives
    ResponseChunk(String),
    /// Final cleaned text that replaces everything streamed so far
    ResponseReplace(String),
    /// A tool failure, or the terminal failure of the run
    Error(String),
}

impl OrchestratorEvent {
    /// Short name of the variant, handy for logs and assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorEvent::Status(_) => "status",
            OrchestratorEvent::ToolCall(_) => "tool_call",
            OrchestratorEvent::ToolArguments(_) => "tool_arguments",
            OrchestratorEvent::ToolExecuting(_) => "tool_executing",
            OrchestratorEvent::ToolResult(_) => "tool_result",
            OrchestratorEvent::ResponseChunk(_) => "response_chunk",
            OrchestratorEvent::ResponseReplace(_) => "response_replace",
            OrchestratorEvent::Error(_) => "error",
        }
    }
}

/// Producer side of the event channel
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventSender {
    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: OrchestratorEvent) {
        log::trace!("event: {:?}", event);
        let _ = self.tx.send(event);
    }

    /// A new consumer that sees events emitted from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.tx.subscribe())
    }
}

/// Consumer side of the event channel
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = OrchestratorEvent> + Send>>,
}

impl EventStream {
    fn new(rx: broadcast::Receiver<OrchestratorEvent>) -> Self {
        let inner = BroadcastStream::new(rx).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    log::warn!("event consumer lagged, {} events dropped", missed);
                    None
                }
            }
        });
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

impl Stream for EventStream {
    type Item = OrchestratorEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Create a channel buffering up to `capacity` events per consumer.
pub fn channel(capacity: usize) -> (EventSender, EventStream) {
    let (tx, rx) = broadcast::channel(capacity.max(1));
    (EventSender { tx }, EventStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order_and_stream_ends() {
        let (tx, rx) = channel(8);
        tx.emit(OrchestratorEvent::Status("one".into()));
        tx.emit(OrchestratorEvent::ResponseChunk("two".into()));
        tx.emit(OrchestratorEvent::ResponseReplace("three".into()));
        drop(tx);

        let kinds: Vec<_> = rx.map(|e| e.kind()).collect().await;
        assert_eq!(kinds, vec!["status", "response_chunk", "response_replace"]);
    }

    #[tokio::test]
    async fn test_lagging_consumer_drops_oldest() {
        let (tx, rx) = channel(2);
        for i in 0..5 {
            tx.emit(OrchestratorEvent::ResponseChunk(i.to_string()));
        }
        drop(tx);

        let events: Vec<_> = rx.collect().await;
        assert_eq!(
            events,
            vec![
                OrchestratorEvent::ResponseChunk("3".into()),
                OrchestratorEvent::ResponseChunk("4".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_emit_without_subscribers() {
        let (tx, rx) = channel(1);
        drop(rx);
        tx.emit(OrchestratorEvent::Status("nobody listens".into()));

        let late = tx.subscribe();
        tx.emit(OrchestratorEvent::Status("late".into()));
        drop(tx);
        let events: Vec<_> = late.collect().await;
        assert_eq!(events, vec![OrchestratorEvent::Status("late".into())]);
    }
}
