//! Observability utilities.
//!
//! Logs always go to stderr: stdout carries the stdio MCP channel.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::http::{AttemptObserver, AttemptRecord};
use crate::types::ObservabilityConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing subscriber once for the process.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies.
pub fn init_tracing(config: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let result = if config.json_logs {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}

/// Logs every outbound attempt: debug on success, warn otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn on_attempt(&self, record: &AttemptRecord) {
        let elapsed_ms = record.elapsed.as_millis() as u64;
        if record.outcome.is_success() {
            tracing::debug!(
                attempt = record.attempt,
                method = %record.method,
                path = %record.path,
                elapsed_ms,
                "backend request succeeded"
            );
            return;
        }

        match record.next_delay {
            Some(delay) => tracing::warn!(
                attempt = record.attempt,
                max_attempts = record.max_attempts,
                method = %record.method,
                path = %record.path,
                elapsed_ms,
                outcome = record.outcome.label(),
                next_delay_ms = delay.as_millis() as u64,
                "backend attempt failed, retrying"
            ),
            None => tracing::warn!(
                attempt = record.attempt,
                max_attempts = record.max_attempts,
                method = %record.method,
                path = %record.path,
                elapsed_ms,
                outcome = record.outcome.label(),
                "backend attempt failed"
            ),
        }
    }
}
