//! Tool health tracking.
//!
//! In-memory sliding-window outcome metrics per tool, fed by the dispatcher
//! and read by the detailed health endpoint. Caller mistakes
//! (`invalid_argument`, `unknown_tool`) and definitive backend answers
//! (`upstream_rejected`) do not count against a tool; only failures to get
//! an answer at all do.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::types::ErrorKind;

/// Health status, ordered from best to least known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Two cut points splitting a metric into healthy / degraded / unhealthy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Band {
    pub healthy: f64,
    pub degraded: f64,
}

impl Band {
    /// Grade a metric where larger is better (availability).
    fn floor(&self, value: f64) -> HealthStatus {
        if value >= self.healthy {
            HealthStatus::Healthy
        } else if value >= self.degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Grade a metric where smaller is better (latency).
    fn ceiling(&self, value: f64) -> HealthStatus {
        if value <= self.healthy {
            HealthStatus::Healthy
        } else if value <= self.degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Health assessment thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Fraction of calls that got an answer.
    pub availability: Band,
    /// Mean latency in milliseconds.
    pub latency_ms: Band,
    /// Calls needed before a tool is graded at all.
    pub min_calls: usize,
    /// Most recent calls kept per tool.
    pub window: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            availability: Band {
                healthy: 0.95,
                degraded: 0.80,
            },
            latency_ms: Band {
                healthy: 2000.0,
                degraded: 5000.0,
            },
            min_calls: 5,
            window: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    latency_ms: u64,
    error: Option<ErrorKind>,
}

impl CallRecord {
    fn is_failure(&self) -> bool {
        matches!(
            self.error,
            Some(ErrorKind::UpstreamUnavailable | ErrorKind::RateLimited | ErrorKind::Internal)
        )
    }
}

/// One pass over a tool's window.
#[derive(Debug, Default)]
struct WindowStats {
    calls: usize,
    failures: usize,
    latency_sum_ms: u64,
    errors: BTreeMap<ErrorKind, usize>,
}

impl WindowStats {
    fn collect<'a>(records: impl IntoIterator<Item = &'a CallRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.calls += 1;
            stats.latency_sum_ms += record.latency_ms;
            if record.is_failure() {
                stats.failures += 1;
            }
            if let Some(kind) = record.error {
                *stats.errors.entry(kind).or_default() += 1;
            }
        }
        stats
    }

    fn availability(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        (self.calls - self.failures) as f64 / self.calls as f64
    }

    fn mean_latency_ms(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.latency_sum_ms as f64 / self.calls as f64
    }
}

/// Health report for a single tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolHealthReport {
    pub tool_name: String,
    pub status: HealthStatus,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub total_calls: usize,
    pub errors: BTreeMap<ErrorKind, usize>,
    pub issues: Vec<String>,
}

/// Health of every registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealthReport {
    pub status: HealthStatus,
    pub tool_reports: Vec<ToolHealthReport>,
    pub summary: HealthSummary,
}

/// Tool counts per status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthSummary {
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub unknown: usize,
}

impl HealthSummary {
    fn count(&mut self, status: HealthStatus) {
        match status {
            HealthStatus::Healthy => self.healthy += 1,
            HealthStatus::Degraded => self.degraded += 1,
            HealthStatus::Unhealthy => self.unhealthy += 1,
            HealthStatus::Unknown => self.unknown += 1,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    windows: HashMap<String, VecDeque<CallRecord>>,
    registered: Vec<String>,
}

/// Shared tool health tracker. Recording takes a short lock and never awaits.
#[derive(Debug)]
pub struct ToolHealthTracker {
    config: HealthConfig,
    state: Mutex<TrackerState>,
}

impl ToolHealthTracker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tools listed here appear in system reports even before their first call.
    pub fn set_registered_tools(&self, tool_names: Vec<String>) {
        self.state().registered = tool_names;
    }

    /// Record one dispatched call. `error` is `None` on success.
    pub fn record(&self, tool_name: &str, latency: Duration, error: Option<ErrorKind>) {
        let capacity = self.config.window.max(1);
        let mut state = self.state();
        let window = state
            .windows
            .entry(tool_name.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        while window.len() >= capacity {
            window.pop_front();
        }
        window.push_back(CallRecord {
            latency_ms: latency.as_millis() as u64,
            error,
        });
    }

    pub fn check_tool_health(&self, tool_name: &str) -> ToolHealthReport {
        let state = self.state();
        self.grade(tool_name, state.windows.get(tool_name))
    }

    fn grade(&self, tool_name: &str, window: Option<&VecDeque<CallRecord>>) -> ToolHealthReport {
        let stats = WindowStats::collect(window.into_iter().flatten());
        let mut report = ToolHealthReport {
            tool_name: tool_name.to_string(),
            status: HealthStatus::Unknown,
            success_rate: stats.availability(),
            avg_latency_ms: stats.mean_latency_ms(),
            total_calls: stats.calls,
            errors: stats.errors,
            issues: Vec::new(),
        };

        if report.total_calls == 0 {
            report.issues.push("no calls recorded".to_string());
            return report;
        }
        if report.total_calls < self.config.min_calls {
            report.issues.push(format!(
                "not enough calls to grade ({}/{})",
                report.total_calls, self.config.min_calls
            ));
            return report;
        }

        let availability = self.config.availability.floor(report.success_rate);
        let latency = self.config.latency_ms.ceiling(report.avg_latency_ms);
        report.status = availability.max(latency);

        if availability != HealthStatus::Healthy {
            report.issues.push(format!(
                "availability {:.1}% below {:.0}%",
                report.success_rate * 100.0,
                self.config.availability.healthy * 100.0
            ));
        }
        if latency != HealthStatus::Healthy {
            report.issues.push(format!(
                "mean latency {:.0}ms above {:.0}ms",
                report.avg_latency_ms, self.config.latency_ms.healthy
            ));
        }
        report
    }

    /// Grade every registered or called tool, sorted by name.
    pub fn check_system_health(&self) -> SystemHealthReport {
        let state = self.state();
        let mut names: Vec<&String> = state.registered.iter().chain(state.windows.keys()).collect();
        names.sort();
        names.dedup();

        let tool_reports: Vec<ToolHealthReport> = names
            .into_iter()
            .map(|name| self.grade(name, state.windows.get(name)))
            .collect();

        let mut summary = HealthSummary::default();
        for report in &tool_reports {
            summary.count(report.status);
        }
        // Ungraded tools do not drag the system down.
        let status = tool_reports
            .iter()
            .map(|r| r.status)
            .filter(|s| *s != HealthStatus::Unknown)
            .max()
            .unwrap_or(HealthStatus::Unknown);

        SystemHealthReport {
            status,
            tool_reports,
            summary,
        }
    }
}

impl Default for ToolHealthTracker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
