//! Shared fixtures for integration tests
#![allow(dead_code)]

use agentloop::{
    AgentOptions, ChatRequest, CompletionSource, Error, EventStream, JsonObjectExt,
    OrchestratorEvent, Result, TextStream, Tools, tool,
};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// One scripted completion
pub enum Reply {
    /// Stream these chunks, then end normally
    Chunks(Vec<String>),
    /// Stream these chunks, then never produce another item
    ChunksThenHang(Vec<String>),
    /// Stream these chunks, then fail with a timeout
    ChunksThenTimeout(Vec<String>),
    /// Refuse to open the stream with this HTTP status
    Status(u16, String),
}

impl Reply {
    pub fn text(chunks: &[&str]) -> Self {
        Reply::Chunks(chunks.iter().map(|c| c.to_string()).collect())
    }
}

/// Completion source that plays back scripted replies and records requests
#[derive(Default)]
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedSource {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

fn ok_chunks(chunks: Vec<String>) -> impl futures::Stream<Item = Result<String>> + Send {
    stream::iter(chunks.into_iter().map(Ok))
}

#[async_trait]
impl CompletionSource for ScriptedSource {
    async fn stream(&self, request: &ChatRequest) -> Result<TextStream> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(Reply::Chunks(chunks)) => Ok(Box::pin(ok_chunks(chunks))),
            Some(Reply::ChunksThenHang(chunks)) => {
                Ok(Box::pin(ok_chunks(chunks).chain(stream::pending())))
            }
            Some(Reply::ChunksThenTimeout(chunks)) => Ok(Box::pin(
                ok_chunks(chunks).chain(stream::once(async { Err(Error::timeout()) })),
            )),
            Some(Reply::Status(status, body)) => Err(Error::from_status(status, body)),
            None => Err(Error::other("script exhausted")),
        }
    }
}

/// A fenced tool-call block as a model would write it.
pub fn tool_block(name: &str, arguments: Value) -> String {
    format!(
        "```json\n{}\n```",
        json!({"tool": name, "arguments": arguments})
    )
}

pub fn options() -> AgentOptions {
    AgentOptions::builder()
        .model("test-model")
        .base_url("http://localhost:1234/v1")
        .build()
        .unwrap()
}

/// Calendar tools that record the order they ran in.
pub fn calendar_tools(journal: Arc<Mutex<Vec<String>>>) -> Tools {
    let read_log = journal.clone();
    let create_log = journal.clone();
    let merge_log = journal;

    Tools::new()
        .with(
            tool("calendar_read", "List events on a day")
                .param("date", "string")
                .build(move |args| {
                    let calls = read_log.clone();
                    async move {
                        let date = args.str_field("date")?.to_string();
                        calls.lock().unwrap().push(format!("calendar_read:{}", date));
                        Ok(json!({"date": date, "events": ["09:00 standup"]}))
                    }
                }),
        )
        .and_then(|tools| {
            tools.with(
                tool("calendar_create", "Create an event")
                    .param("title", "string")
                    .build(move |args| {
                        let calls = create_log.clone();
                        async move {
                            let title = args.str_field("title")?.to_string();
                            calls.lock().unwrap().push(format!("calendar_create:{}", title));
                            Ok(json!({"created": title}))
                        }
                    }),
            )
        })
        .and_then(|tools| {
            tools.with(tool("memory_merge", "Merge memories").build(move |_| {
                let calls = merge_log.clone();
                async move {
                    calls.lock().unwrap().push("memory_merge".to_string());
                    Ok(json!("merged"))
                }
            }))
        })
        .unwrap()
}

/// Drain a finished run's events.
pub async fn collect(events: EventStream) -> Vec<OrchestratorEvent> {
    events.collect().await
}

pub fn kinds(events: &[OrchestratorEvent]) -> Vec<&'static str> {
    events.iter().map(OrchestratorEvent::kind).collect()
}
