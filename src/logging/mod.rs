//! Structured logging client
//!
//! A [`LoggingClient`] is bound to one project and hands out [`Logger`]s, each
//! writing to a named log and attributed to a [`MonitoredResource`]. Loggers
//! buffer entries; [`Logger::flush`] hands the buffer to the configured
//! [`LogSink`]. Handlers hold a [`FlushGuard`] so the buffer is drained on
//! every exit path of a request.

use chrono::{DateTime, Utc};
use opentelemetry::trace::SpanContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::LogError;
use crate::metrics::Metrics;
use crate::resource::MonitoredResource;

pub mod sink;

pub use sink::{LogSink, MemorySink, StdoutSink};

/// Log entry severity, using the cloud logging level names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

/// Entry body: a plain message or a JSON document
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

/// Link from a log entry to the span that was active when it was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLink {
    /// Full trace resource name, `projects/{project}/traces/{trace_id}`
    pub trace: String,
    pub span_id: String,
    pub sampled: bool,
}

impl TraceLink {
    pub fn new(project_id: &str, span_context: &SpanContext) -> Self {
        Self {
            trace: format!("projects/{}/traces/{}", project_id, span_context.trace_id()),
            span_id: span_context.span_id().to_string(),
            sampled: span_context.is_sampled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub severity: Severity,
    pub payload: Payload,
    pub labels: BTreeMap<String, String>,
    pub trace: Option<TraceLink>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(severity: Severity, payload: Payload) -> Self {
        Self {
            severity,
            payload,
            labels: BTreeMap::new(),
            trace: None,
            timestamp: Utc::now(),
        }
    }

    pub fn text(severity: Severity, message: impl Into<String>) -> Self {
        Self::new(severity, Payload::Text(message.into()))
    }

    /// Entry whose payload is the JSON form of `value`
    pub fn structured<T: Serialize>(severity: Severity, value: &T) -> Result<Self, LogError> {
        Ok(Self::new(severity, Payload::Json(serde_json::to_value(value)?)))
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_trace(mut self, trace: Option<TraceLink>) -> Self {
        self.trace = trace;
        self
    }

    /// Text of the entry when it has a plain message
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(message) => Some(message),
            Payload::Json(_) => None,
        }
    }
}

/// Client bound to a single project
#[derive(Clone)]
pub struct LoggingClient {
    project_id: String,
    sink: Arc<dyn LogSink>,
}

impl LoggingClient {
    /// Create a client for `project_id`
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidProjectId`] if `project_id` is not a valid
    /// cloud project id: at most 30 characters, starting with a lowercase letter,
    /// containing only lowercase letters, digits and hyphens, and not ending
    /// with a hyphen.
    pub fn new(project_id: impl Into<String>, sink: Arc<dyn LogSink>) -> Result<Self, LogError> {
        let project_id = project_id.into();
        validate_project_id(&project_id)?;
        Ok(Self { project_id, sink })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Bind a logger writing to `log_id`, attributed to `resource`
    pub fn logger(&self, log_id: &str, resource: MonitoredResource) -> Logger {
        Logger {
            log_name: format!("projects/{}/logs/{}", self.project_id, log_id),
            resource,
            sink: self.sink.clone(),
            buffer: Mutex::new(Vec::new()),
            metrics: None,
        }
    }
}

fn validate_project_id(project_id: &str) -> Result<(), LogError> {
    let invalid = |reason: &str| LogError::InvalidProjectId {
        project_id: project_id.to_string(),
        reason: reason.to_string(),
    };

    if project_id.len() > 30 {
        return Err(invalid("must be at most 30 characters"));
    }
    if !project_id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("must start with a lowercase letter"));
    }
    if !project_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "may only contain lowercase letters, digits and hyphens",
        ));
    }
    if project_id.ends_with('-') {
        return Err(invalid("must not end with a hyphen"));
    }
    Ok(())
}

/// Named logger attributed to a monitored resource
pub struct Logger {
    log_name: String,
    resource: MonitoredResource,
    sink: Arc<dyn LogSink>,
    buffer: Mutex<Vec<LogEntry>>,
    metrics: Option<Metrics>,
}

impl Logger {
    /// Count every logged entry by severity in `metrics`
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn resource(&self) -> &MonitoredResource {
        &self.resource
    }

    /// Buffer an entry until the next flush
    pub fn log(&self, entry: LogEntry) {
        if let Some(metrics) = &self.metrics {
            metrics.log_entry(entry.severity);
        }
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    /// Number of entries waiting for a flush
    pub fn pending(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Hand all buffered entries to the sink
    ///
    /// Entries are removed from the buffer before the sink is called, so a
    /// failed write drops them rather than retrying.
    pub fn flush(&self) -> Result<(), LogError> {
        let entries = std::mem::take(
            &mut *self
                .buffer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        if entries.is_empty() {
            return Ok(());
        }
        self.sink.write(&self.log_name, &self.resource, &entries)
    }
}

/// Flushes a logger when dropped
pub struct FlushGuard {
    logger: Arc<Logger>,
}

impl FlushGuard {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if let Err(e) = self.logger.flush() {
            tracing::warn!(
                error = %e,
                log_name = %self.logger.log_name(),
                "Failed to flush log entries"
            );
        }
    }
}
