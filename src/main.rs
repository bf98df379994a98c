//! Whistle MCP server - main entry point.
//!
//! Serves MCP over stdin/stdout and, on the health port, the liveness /
//! readiness endpoints plus `POST /mcp`. Both surfaces share one dispatcher,
//! so the rate limit is process-wide.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use whistle_mcp::health::{self, AppState, ServiceState};
use whistle_mcp::http::ResilientClient;
use whistle_mcp::mcp::{serve_stdio, McpServer};
use whistle_mcp::observability::{init_tracing, TracingObserver};
use whistle_mcp::tools::Dispatcher;
use whistle_mcp::types::{
    ClientConfig, Config, ObservabilityConfig, ServerConfig, DEFAULT_BASE_URL,
};

#[derive(Debug, Parser)]
#[command(name = "whistle-mcp", version, about)]
struct Cli {
    /// Backend base URL.
    #[arg(long, env = "EXPRESS_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Bearer credential for the backend.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Port for health endpoints and `POST /mcp`.
    #[arg(long, env = "HEALTH_PORT", default_value_t = 8080)]
    health_port: u16,

    /// Comma-separated browser origins allowed on the HTTP surface.
    #[arg(long, env = "CORS_ORIGINS", default_value = "*", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "LOG_FORMAT", default_value = "text", value_parser = ["text", "json"])]
    log_format: String,

    /// Total attempts per backend request.
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    #[arg(long, env = "RETRY_DELAY", default_value = "1s", value_parser = parse_duration)]
    retry_delay: Duration,

    #[arg(long, env = "RETRY_MAX_DELAY", default_value = "10s", value_parser = parse_duration)]
    retry_max_delay: Duration,

    #[arg(long, env = "CONNECT_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    connect_timeout: Duration,

    #[arg(long, env = "READ_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    read_timeout: Duration,

    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value_t = 60)]
    rate_limit_per_minute: u32,

    #[arg(long, env = "RATE_LIMIT_MAX_WAIT", default_value = "5s", value_parser = parse_duration)]
    rate_limit_max_wait: Duration,

    /// Serve only the HTTP surface; ignore stdin.
    #[arg(long)]
    http_only: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            server: ServerConfig {
                health_addr: format!("0.0.0.0:{}", self.health_port),
                cors_origins: self.cors_origins,
            },
            observability: ObservabilityConfig {
                log_level: self.log_level,
                json_logs: self.log_format == "json",
            },
            client: ClientConfig {
                base_url: self.base_url,
                api_key: self.api_key,
                connect_timeout: self.connect_timeout,
                read_timeout: self.read_timeout,
                max_retries: self.max_retries,
                retry_base_delay: self.retry_delay,
                retry_max_delay: self.retry_max_delay,
                rate_limit_per_minute: self.rate_limit_per_minute,
                rate_limit_max_wait: self.rate_limit_max_wait,
                ..ClientConfig::default()
            },
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::deserialize(serde_json::Value::from(s)).map_err(|e| e.to_string())
}

async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate => {}
        _ = cancel.cancelled() => return,
    }
    tracing::info!("shutdown signal received");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let http_only = cli.http_only;
    let config = cli.into_config();
    config.validate()?;

    init_tracing(&config.observability);

    let client = ResilientClient::from_config(Arc::new(config.client.clone()))?
        .with_observer(Arc::new(TracingObserver));
    let dispatcher = Arc::new(Dispatcher::new(client)?);
    let server = McpServer::new(dispatcher.clone());
    let service = Arc::new(ServiceState::new());

    tracing::info!(
        instance_id = %service.instance_id(),
        base_url = %config.client.base_url,
        tools = dispatcher.catalog().len(),
        rate_limit_per_minute = config.client.rate_limit_per_minute,
        "whistle MCP server starting"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let listener = TcpListener::bind(&config.server.health_addr).await?;
    let state = AppState {
        service: service.clone(),
        mcp: server.clone(),
        cors_origins: config.server.cors_origins.clone().into(),
    };
    let http = tokio::spawn(health::serve(listener, state, cancel.clone()));

    if http_only {
        cancel.cancelled().await;
    } else {
        serve_stdio(server, cancel.clone()).await?;
        cancel.cancel();
    }
    service.mark_shutting_down();

    http.await??;
    tracing::info!("whistle MCP server stopped");
    Ok(())
}
