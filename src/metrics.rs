//! Prometheus metrics collection for gcfexample
//!
//! This module provides process-level instrumentation for tracking:
//! - Function invocations by outcome
//! - Initialization attempts by result
//! - Structured log entries by severity
//! - Best-effort custom-metric call failures by operation
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.
//! They describe the function itself and are independent of the custom metric
//! the handler writes to the monitoring API.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::logging::Severity;

/// How a function invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Response produced (possibly with absorbed monitoring errors)
    Served,
    /// Initialization failed, request rejected with 503
    Unavailable,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Served => "served",
            RequestOutcome::Unavailable => "unavailable",
        }
    }
}

/// Result of one run of the initializer body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitResult {
    Success,
    Failure,
}

impl InitResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitResult::Success => "success",
            InitResult::Failure => "failure",
        }
    }
}

/// Custom-metric API call that can fail without failing the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitoringOperation {
    CreateDescriptor,
    WriteTimeSeries,
}

impl MonitoringOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringOperation::CreateDescriptor => "create_descriptor",
            MonitoringOperation::WriteTimeSeries => "write_time_series",
        }
    }
}

/// Metrics collector for gcfexample
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: IntCounterVec,
    init_attempts: IntCounterVec,
    log_entries: IntCounterVec,
    monitoring_failures: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 outcomes
        let requests_total = IntCounterVec::new(
            Opts::new(
                "gcfexample_requests_total",
                "Total number of function invocations by outcome",
            ),
            &["outcome"],
        )?;

        // A success is recorded at most once per process. Repeated failures mean
        // the environment is misconfigured and every request is being rejected.
        let init_attempts = IntCounterVec::new(
            Opts::new(
                "gcfexample_init_attempts_total",
                "Total number of client initialization attempts by result",
            ),
            &["result"],
        )?;

        // Cardinality: at most 9 severities
        let log_entries = IntCounterVec::new(
            Opts::new(
                "gcfexample_log_entries_total",
                "Total number of structured log entries by severity",
            ),
            &["severity"],
        )?;

        let monitoring_failures = IntCounterVec::new(
            Opts::new(
                "gcfexample_monitoring_failures_total",
                "Total number of failed custom-metric API calls by operation. \
                These failures are logged and never fail the request.",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(init_attempts.clone()))?;
        registry.register(Box::new(log_entries.clone()))?;
        registry.register(Box::new(monitoring_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            init_attempts,
            log_entries,
            monitoring_failures,
        })
    }

    pub fn record_request(&self, outcome: RequestOutcome) {
        self.requests_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn requests_count(&self, outcome: RequestOutcome) -> u64 {
        self.requests_total
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    pub fn init_attempt(&self, result: InitResult) {
        self.init_attempts
            .with_label_values(&[result.as_str()])
            .inc();
    }

    pub fn init_attempts_count(&self, result: InitResult) -> u64 {
        self.init_attempts
            .with_label_values(&[result.as_str()])
            .get()
    }

    pub fn log_entry(&self, severity: Severity) {
        self.log_entries
            .with_label_values(&[severity.as_str()])
            .inc();
    }

    pub fn log_entries_count(&self, severity: Severity) -> u64 {
        self.log_entries
            .with_label_values(&[severity.as_str()])
            .get()
    }

    /// Record a failed custom-metric API call
    ///
    /// The handler logs the failure as an ERROR entry as well; this counter
    /// makes repeated failures visible without reading logs.
    pub fn monitoring_failure(&self, operation: MonitoringOperation) {
        self.monitoring_failures
            .with_label_values(&[operation.as_str()])
            .inc();
    }

    pub fn monitoring_failures_count(&self, operation: MonitoringOperation) -> u64 {
        self.monitoring_failures
            .with_label_values(&[operation.as_str()])
            .get()
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                "Prometheus text encoder failed"
            );
            prometheus::Error::Msg(format!(
                "Failed to encode {} metric families: {}",
                metric_count, e
            ))
        })?;

        String::from_utf8(buffer).map_err(|e| {
            tracing::error!(
                invalid_byte_index = e.utf8_error().valid_up_to(),
                "Prometheus encoder produced invalid UTF-8"
            );
            prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
        })
    }
}
