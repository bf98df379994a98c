//! Structured tool results returned to the agent.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{Error, ErrorKind};

/// Error half of a `ToolResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub retriable: bool,
    /// Offending argument for `invalid_argument`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Backend status for `upstream_rejected`, last status for `upstream_unavailable`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    /// Backend payload (rejections) or attempt summary (unavailable).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&Error> for ToolError {
    fn from(err: &Error) -> Self {
        let mut out = ToolError {
            kind: err.kind(),
            message: err.agent_message(),
            retriable: err.is_retriable(),
            field: None,
            status: None,
            retry_after_ms: None,
            details: None,
        };
        match err {
            Error::InvalidArgument { field, .. } => out.field = Some(field.clone()),
            Error::RateLimited { retry_after } => {
                out.retry_after_ms = Some(retry_after.as_millis() as u64);
            }
            Error::UpstreamUnavailable {
                attempts,
                last_status,
                last_error,
                retry_after,
            } => {
                out.status = *last_status;
                out.retry_after_ms = retry_after.map(|d| d.as_millis() as u64);
                out.details = Some(json!({
                    "attempts": attempts,
                    "last_error": last_error,
                }));
            }
            Error::UpstreamRejected { status, body, .. } => {
                out.status = Some(*status);
                out.details = Some(body.clone());
            }
            _ => {}
        }
        out
    }
}

/// Outcome of one tool call: `data` on success, `error` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ToolError::from(error)),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

impl From<crate::types::Result<Value>> for ToolResult {
    fn from(result: crate::types::Result<Value>) -> Self {
        match result {
            Ok(data) => ToolResult::ok(data),
            Err(err) => ToolResult::err(&err),
        }
    }
}
