//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and carry
//! enough structure for an agent to decide whether to retry, fix its input,
//! or give up.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error classification surfaced in `ToolResult.error.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    UnknownTool,
    RateLimited,
    UpstreamUnavailable,
    UpstreamRejected,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamRejected => "upstream_rejected",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Main error enum for the MCP server.
#[derive(Error, Debug)]
pub enum Error {
    /// Tool input failed schema or constraint checks. Never reaches the backend.
    #[error("invalid argument '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    /// Dispatch miss.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Local rate ceiling still exhausted after the bounded wait.
    #[error("rate limited: retry after {}ms", retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    /// Transient failure that survived every attempt, or a backend
    /// `Retry-After` longer than the retry budget allows.
    #[error("upstream unavailable after {attempts} attempt(s): {last_error}")]
    UpstreamUnavailable {
        attempts: u32,
        last_status: Option<u16>,
        last_error: String,
        retry_after: Option<Duration>,
    },

    /// Definitive backend rejection; `body` is the backend payload verbatim.
    #[error("upstream rejected request (status {status}): {message}")]
    UpstreamRejected {
        status: u16,
        message: String,
        body: Value,
    },

    /// Malformed request or misconfiguration.
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify into the tool-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::UnknownTool(_) => ErrorKind::UnknownTool,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Error::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            Error::Internal(_) | Error::Config(_) | Error::Serialization(_) | Error::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the caller may reasonably retry the same tool call later.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::UpstreamUnavailable
        )
    }

    /// Message passed to the agent. Backend rejections keep the backend text verbatim.
    pub fn agent_message(&self) -> String {
        match self {
            Error::UpstreamRejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Convert to a JSON-RPC 2.0 error code.
    pub fn to_jsonrpc_code(&self) -> i64 {
        match self {
            Error::InvalidArgument { .. } => -32602,
            Error::UnknownTool(_) => -32601,
            Error::RateLimited { .. } => -32000,
            Error::UpstreamUnavailable { .. } => -32001,
            Error::UpstreamRejected { .. } => -32002,
            Error::Serialization(_) => -32700,
            Error::Internal(_) | Error::Config(_) | Error::Io(_) => -32603,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool(name.into())
    }

    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
