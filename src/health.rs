//! Health endpoints and the HTTP MCP endpoint.
//!
//! - `GET /health/live`: process is up and not shutting down
//! - `GET /health/ready`, `GET /ready`, `GET /readyz`: tools registered and
//!   backend reachable
//! - `GET /health`, `GET /healthz`: detailed report
//! - `POST /mcp`: JSON-RPC 2.0, same handler as stdio

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::mcp::protocol::{error_response, RpcError};
use crate::mcp::McpServer;
use crate::rate_limiter::RateLimitSnapshot;
use crate::tools::health::{HealthStatus, SystemHealthReport};
use crate::types::InstanceId;

/// Upper bound on one readiness probe of the backend.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Process identity and lifecycle flags.
#[derive(Debug)]
pub struct ServiceState {
    instance_id: InstanceId,
    started_at: DateTime<Utc>,
    started: Instant,
    shutting_down: AtomicBool,
}

impl ServiceState {
    pub fn new() -> Self {
        Self {
            instance_id: InstanceId::new(),
            started_at: Utc::now(),
            started: Instant::now(),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state of the health router.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<ServiceState>,
    pub mcp: McpServer,
    pub cors_origins: Arc<[String]>,
}

/// Backend reachability as seen by one probe.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub reachable: bool,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detailed health payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub ready: bool,
    pub instance_id: String,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub tools: Vec<String>,
    pub backend: BackendStatus,
    pub rate_limit: RateLimitSnapshot,
    pub tool_health: SystemHealthReport,
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);
    Router::new()
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/ready", get(ready))
        .route("/readyz", get(ready))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/mcp", post(mcp))
        .layer(cors)
        .with_state(state)
}

/// CORS policy for browser-hosted MCP clients. An empty list or `*` allows
/// any origin; unparsable origins are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86_400));

    if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Serve the router on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "health server listening");
    let service = state.service.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            service.mark_shutting_down();
        })
        .await
}

async fn live(State(state): State<AppState>) -> Response {
    let status = if state.service.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let body = json!({
        "status": if status == StatusCode::OK { "alive" } else { "shutting_down" },
        "instance_id": state.service.instance_id().short(),
    });
    (status, Json(body)).into_response()
}

async fn ready(State(state): State<AppState>) -> Response {
    let report = build_report(&state).await;
    if report.ready {
        let body = json!({
            "status": "ready",
            "instance_id": report.instance_id,
            "backend": report.backend,
        });
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(report)).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Response {
    let report = build_report(&state).await;
    let code = if report.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(report)).into_response()
}

async fn mcp(State(state): State<AppState>, body: Bytes) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            let error = RpcError::parse_error(format!("Invalid JSON: {e}"));
            return Json(error_response(Value::Null, error)).into_response();
        }
    };
    let is_batch = incoming.is_array();
    let mut responses = state.mcp.handle_message(incoming).await;

    match (is_batch, responses.len()) {
        (_, 0) => StatusCode::ACCEPTED.into_response(),
        (false, _) => Json(responses.swap_remove(0)).into_response(),
        (true, _) => Json(Value::Array(responses)).into_response(),
    }
}

async fn probe_backend(state: &AppState) -> BackendStatus {
    let client = state.mcp.dispatcher().client();
    let base_url = client.config().base_url.clone();
    match tokio::time::timeout(PROBE_TIMEOUT, client.probe()).await {
        Ok(Ok(status)) => BackendStatus {
            reachable: true,
            base_url,
            status: Some(status),
            error: None,
        },
        Ok(Err(error)) => BackendStatus {
            reachable: false,
            base_url,
            status: None,
            error: Some(error),
        },
        Err(_) => BackendStatus {
            reachable: false,
            base_url,
            status: None,
            error: Some(format!("probe timed out after {}s", PROBE_TIMEOUT.as_secs())),
        },
    }
}

async fn build_report(state: &AppState) -> HealthReport {
    let dispatcher = state.mcp.dispatcher();
    let backend = probe_backend(state).await;
    let tools = dispatcher.catalog().list_names();
    let tool_health = dispatcher.health().check_system_health();
    let rate_limit = dispatcher.client().limiter().snapshot().await;

    let ready = !state.service.is_shutting_down() && !tools.is_empty() && backend.reachable;
    let status = if !ready {
        HealthStatus::Unhealthy
    } else if matches!(
        tool_health.status,
        HealthStatus::Degraded | HealthStatus::Unhealthy
    ) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthReport {
        status,
        ready,
        instance_id: state.service.instance_id().short().to_string(),
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.service.started_at,
        uptime_seconds: state.service.uptime().as_secs(),
        tools,
        backend,
        rate_limit,
        tool_health,
    }
}
