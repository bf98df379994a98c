//! Tool dispatch: name lookup, argument preparation, one backend
//! request, result shaping.
//!
//! Nothing here retries: a tool call issues exactly one `execute` on the
//! shared client and maps whatever comes back into a `ToolResult`.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use super::args::ToolArgs;
use super::catalog::{ToolCatalog, ToolEntry};
use super::groups;
use super::health::ToolHealthTracker;
use super::result::ToolResult;
use crate::http::{RequestDescriptor, ResilientClient, Response};
use crate::types::{CallId, ErrorKind, Result};

/// Builds the single backend request for a prepared argument set.
pub type BuildFn = fn(&ToolArgs) -> Result<RequestDescriptor>;

/// Maps a successful backend response into `ToolResult.data`.
pub type ShapeFn = fn(Response, &ToolArgs) -> Result<Value>;

/// One tool: metadata plus its builder and shaper.
#[derive(Clone)]
pub struct ToolSpec {
    pub entry: ToolEntry,
    pub build: BuildFn,
    pub shape: ShapeFn,
}

impl ToolSpec {
    pub fn new(entry: ToolEntry, build: BuildFn, shape: ShapeFn) -> Self {
        Self {
            entry,
            build,
            shape,
        }
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.entry.name)
            .finish_non_exhaustive()
    }
}

/// Shaper returning the backend payload unchanged.
pub fn passthrough(response: Response, _args: &ToolArgs) -> Result<Value> {
    Ok(response.body)
}

#[derive(Clone, Copy)]
struct Handler {
    build: BuildFn,
    shape: ShapeFn,
}

/// Tool registry and dispatcher shared by every transport.
pub struct Dispatcher {
    catalog: ToolCatalog,
    handlers: HashMap<String, Handler>,
    client: ResilientClient,
    health: Arc<ToolHealthTracker>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.catalog.list_names())
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Dispatcher with every built-in tool group registered.
    pub fn new(client: ResilientClient) -> Result<Self> {
        Self::with_tools(client, groups::all())
    }

    pub fn with_tools(client: ResilientClient, specs: Vec<ToolSpec>) -> Result<Self> {
        let mut catalog = ToolCatalog::new();
        let mut handlers = HashMap::with_capacity(specs.len());
        for spec in specs {
            handlers.insert(
                spec.entry.name.clone(),
                Handler {
                    build: spec.build,
                    shape: spec.shape,
                },
            );
            catalog.register(spec.entry)?;
        }

        let health = Arc::new(ToolHealthTracker::default());
        health.set_registered_tools(catalog.list_names());
        Ok(Self {
            catalog,
            handlers,
            client,
            health,
        })
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    pub fn health(&self) -> &Arc<ToolHealthTracker> {
        &self.health
    }

    /// MCP tool descriptors, sorted by name.
    pub fn list_tools(&self) -> Vec<Value> {
        self.catalog
            .list_entries()
            .into_iter()
            .map(ToolEntry::descriptor)
            .collect()
    }

    /// Dispatch one tool call. Never fails: errors become `ToolResult.error`.
    pub async fn call(&self, name: &str, args: Value) -> ToolResult {
        let call_id = CallId::new();
        let span = tracing::info_span!("tool_call", %call_id, tool = name);
        async {
            let started = Instant::now();
            tracing::info!(arg_keys = ?arg_keys(&args), "tool call started");

            let result = self.invoke(name, args).await;
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_millis() as u64;

            match &result {
                Ok(_) => tracing::info!(elapsed_ms, "tool call succeeded"),
                Err(err) => tracing::warn!(
                    elapsed_ms,
                    kind = err.kind().as_str(),
                    retriable = err.is_retriable(),
                    error = %err,
                    "tool call failed"
                ),
            }

            let kind = result.as_ref().err().map(|e| e.kind());
            if !matches!(kind, Some(ErrorKind::UnknownTool | ErrorKind::InvalidArgument)) {
                self.health.record(name, elapsed, kind);
            }
            ToolResult::from(result)
        }
        .instrument(span)
        .await
    }

    /// Prepare, build, execute and shape. Validation failures return before
    /// any request is issued.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value> {
        let args = self.catalog.prepare(name, args)?;
        let handler = self
            .handlers
            .get(name)
            .copied()
            .ok_or_else(|| crate::types::Error::unknown_tool(name))?;
        tracing::debug!(args = %args.masked(), "arguments prepared");

        let request = (handler.build)(&args)?;
        let response = self.client.execute(&request).await?;
        (handler.shape)(response, &args)
    }
}

fn arg_keys(args: &Value) -> Vec<&str> {
    args.as_object()
        .map(|map| map.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedTransport;
    use crate::http::transport::{MockTransport, RawResponse};
    use crate::rate_limiter::RateLimiter;
    use crate::types::ClientConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> Arc<ClientConfig> {
        Arc::new(ClientConfig {
            base_url: "http://backend.test/v3".to_string(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(100),
            rate_limit_max_wait: Duration::ZERO,
            ..ClientConfig::default()
        })
    }

    fn dispatcher(transport: Arc<dyn crate::http::Transport>) -> Dispatcher {
        let config = config();
        let limiter = Arc::new(RateLimiter::from_config(&config));
        Dispatcher::new(ResilientClient::new(config, transport, limiter)).unwrap()
    }

    #[tokio::test]
    async fn test_missing_argument_sends_nothing() {
        let mut mock = MockTransport::new();
        mock.expect_send().times(0);
        let dispatcher = dispatcher(Arc::new(mock));

        let result = dispatcher
            .call("search", json!({"longitude": 77.59, "keyword": "burger"}))
            .await;
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidArgument);
        assert_eq!(error.field.as_deref(), Some("latitude"));
        assert!(!error.retriable);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let mut mock = MockTransport::new();
        mock.expect_send().times(0);
        let dispatcher = dispatcher(Arc::new(mock));

        let result = dispatcher.call("launch_rocket", json!({})).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::UnknownTool));
    }

    #[tokio::test]
    async fn test_search_builds_descriptor_and_shapes() {
        let transport = Arc::new(ScriptedTransport::repeating(Ok(RawResponse::new(
            200,
            r#"[{"id":"p1"},{"id":"p2"}]"#,
        ))));
        let dispatcher = dispatcher(transport.clone());

        let result = dispatcher
            .call(
                "search",
                json!({"latitude": 12.97, "longitude": 77.59, "keyword": "burger", "radius_km": 2}),
            )
            .await;
        assert!(result.success, "{result:?}");
        let data = result.data.unwrap();
        assert_eq!(data["providers"], json!([{"id": "p1"}, {"id": "p2"}]));
        assert_eq!(data["total_count"], 2);

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path(), "/searchAround");
        assert_eq!(sent[0].body().unwrap()["location"], json!([77.59, 12.97]));
        assert_eq!(transport.urls()[0], "http://backend.test/v3/searchAround");
    }

    #[tokio::test]
    async fn test_rejection_surfaces_status_and_body() {
        let transport = Arc::new(ScriptedTransport::repeating(Ok(RawResponse::new(
            401,
            r#"{"error":"invalid_otp"}"#,
        ))));
        let dispatcher = dispatcher(transport.clone());

        let result = dispatcher
            .call("verify_otp", json!({"user_id": "u1", "otp": "0000"}))
            .await;
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::UpstreamRejected);
        assert_eq!(error.status, Some(401));
        assert_eq!(error.message, r#"{"error":"invalid_otp"}"#);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_outcomes_recorded_for_health() {
        let transport = Arc::new(ScriptedTransport::repeating(Ok(RawResponse::new(200, "{}"))));
        let dispatcher = dispatcher(transport);

        dispatcher
            .call("resend_otp", json!({"user_id": "u1"}))
            .await;
        dispatcher.call("resend_otp", json!({})).await;

        let report = dispatcher.health().check_tool_health("resend_otp");
        assert_eq!(report.total_calls, 1);
    }

    #[test]
    fn test_list_tools_has_every_group() {
        let dispatcher = dispatcher(Arc::new(MockTransport::new()));
        let names: Vec<String> = dispatcher
            .list_tools()
            .iter()
            .map(|t| t["name"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "create_whistle",
                "delete_whistle",
                "get_user_profile",
                "list_whistles",
                "resend_otp",
                "search",
                "sign_in",
                "toggle_live_tracking",
                "toggle_visibility",
                "toggle_whistle_sound",
                "update_whistle",
                "verify_otp",
            ]
        );
    }
}
