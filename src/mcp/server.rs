//! MCP request handling shared by the stdio and HTTP transports.

use serde_json::{json, Value};
use std::sync::Arc;

use super::protocol::{
    error_response, success_response, RpcError, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::tools::{Dispatcher, ToolResult};

/// What a single decoded message asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Request expecting a response.
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    /// Fire-and-forget notification.
    Notification { method: String, params: Value },
    /// Response from the client, or anything else without a method.
    Ignored,
    /// Malformed envelope; answer with this error.
    Invalid { id: Value, error: RpcError },
}

impl Incoming {
    pub fn classify(incoming: Value) -> Self {
        let Value::Object(mut obj) = incoming else {
            return Incoming::Invalid {
                id: Value::Null,
                error: RpcError::invalid_request("Request must be a JSON object"),
            };
        };
        let id = obj.remove("id");
        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Incoming::Invalid {
                id: id.unwrap_or(Value::Null),
                error: RpcError::invalid_request("jsonrpc must be '2.0'"),
            };
        }
        let Some(method) = obj.get("method").and_then(Value::as_str).map(str::to_string) else {
            return Incoming::Ignored;
        };
        let params = obj.remove("params").unwrap_or(Value::Null);
        match id {
            Some(id) => Incoming::Request { id, method, params },
            None => Incoming::Notification { method, params },
        }
    }
}

/// MCP server: protocol methods over a shared tool dispatcher.
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Handle one decoded message (single or batch) and return the responses
    /// to send. Requests run to completion in order.
    pub async fn handle_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();
        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single(Incoming::classify(item.clone())).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single(Incoming::classify(incoming)).await {
            responses.push(response);
        }
        responses
    }

    pub async fn handle_single(&self, incoming: Incoming) -> Option<Value> {
        match incoming {
            Incoming::Request { id, method, params } => {
                Some(match self.handle_request(&method, params).await {
                    Ok(payload) => success_response(id, payload),
                    Err(err) => error_response(id, err),
                })
            }
            Incoming::Notification { method, .. } => {
                tracing::debug!(%method, "notification received");
                None
            }
            Incoming::Ignored => None,
            Incoming::Invalid { id, error } => Some(error_response(id, error)),
        }
    }

    pub async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Tools for the Whistle service: search nearby providers, sign in with phone + OTP, manage whistles and user settings. Call sign_in then verify_otp to obtain an access_token."
        })
    }

    fn tools_list_payload(&self) -> Value {
        json!({ "tools": self.dispatcher.list_tools() })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires a string 'name'"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let result = self.dispatcher.call(name, arguments).await;
        call_result_payload(&result)
    }
}

/// Wrap a `ToolResult` as an MCP `CallToolResult`.
pub fn call_result_payload(result: &ToolResult) -> Result<Value, RpcError> {
    let structured =
        serde_json::to_value(result).map_err(|e| RpcError::internal(e.to_string()))?;
    let text =
        serde_json::to_string(&structured).map_err(|e| RpcError::internal(e.to_string()))?;
    Ok(json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": structured,
        "isError": !result.success,
    }))
}
