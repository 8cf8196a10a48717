//! Completion stream client
//!
//! [`CompletionSource`] is the seam between the orchestrator and whatever
//! produces model output. [`HttpCompletionClient`] talks to an
//! OpenAI-compatible `/chat/completions` endpoint; tests substitute scripted
//! sources.

use crate::sse::decode_event_stream;
pub use crate::sse::TextStream;
use crate::types::{AgentOptions, ChatRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Producer of streamed completions
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Open a completion stream for `request`.
    ///
    /// Failures to open the stream (transport, HTTP status) are returned
    /// directly; failures after that arrive as stream items.
    async fn stream(&self, request: &ChatRequest) -> Result<TextStream>;
}

/// Streaming client for OpenAI-compatible chat completion endpoints
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCompletionClient {
    /// Build a client from agent options.
    ///
    /// The timeout covers the whole request including the streamed body.
    pub fn new(options: &AgentOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api_key: options.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionSource for HttpCompletionClient {
    async fn stream(&self, request: &ChatRequest) -> Result<TextStream> {
        let url = self.endpoint();
        log::debug!(
            "POST {} (model {}, {} messages)",
            url,
            request.model,
            request.messages.len()
        );

        let mut builder = self
            .http
            .post(&url)
            .header("Accept", "text/event-stream")
            .header("Content-Type", "application/json")
            .json(request);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder.send().await.map_err(Error::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            log::warn!("completion endpoint returned {}: {}", status, body);
            return Err(Error::from_status(status.as_u16(), body));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::transport));
        Ok(decode_event_stream(body))
    }
}
