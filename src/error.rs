//! Error types for agentloop

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Only the transport, HTTP status and invalid-response variants abort an
/// orchestration run. Everything else is absorbed into conversation state by
/// the orchestrator or surfaces from configuration and tool code.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure (connectivity, DNS, TLS, broken body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The completion endpoint answered with a 5xx status
    #[error("Server unavailable (HTTP {status}): {body}")]
    ServerUnavailable { status: u16, body: String },

    /// The completion endpoint rejected the request (4xx or other non-success status)
    #[error("Client error (HTTP {status}): {body}")]
    ClientError { status: u16, body: String },

    /// The event stream ended without producing anything usable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    Tool(#[from] ToolError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Error::InvalidResponse(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Classify a non-success HTTP status together with its body text.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status >= 500 {
            Error::ServerUnavailable { status, body }
        } else {
            Error::ClientError { status, body }
        }
    }

    /// Convert a reqwest error, keeping timeouts distinguishable.
    pub fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(err)
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ServerUnavailable { status, .. } | Error::ClientError { status, .. } => {
                Some(*status)
            }
            Error::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error terminates an orchestration run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Timeout
                | Error::ServerUnavailable { .. }
                | Error::ClientError { .. }
                | Error::InvalidResponse(_)
        )
    }
}

/// Failure of a single tool invocation.
///
/// Never aborts a run: the orchestrator turns it into a textual conversation
/// item so the model can react on the next round.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No executor is registered under this name
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// The executor ran and reported a failure
    #[error("tool '{tool}' failed: {message}")]
    Failed { tool: String, message: String },
}

impl ToolError {
    pub fn failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Failed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Name of the tool that failed.
    pub fn tool(&self) -> &str {
        match self {
            ToolError::UnknownTool(tool) | ToolError::Failed { tool, .. } => tool,
        }
    }

    /// Failure description without the tool name prefix.
    pub fn message(&self) -> String {
        match self {
            ToolError::UnknownTool(_) => "no such tool is registered".to_string(),
            ToolError::Failed { message, .. } => message.clone(),
        }
    }
}
