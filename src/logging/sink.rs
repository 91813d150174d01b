//! Log sinks
//!
//! [`StdoutSink`] writes one JSON object per entry in the format the cloud
//! logging agent parses from a function's standard output. [`MemorySink`]
//! keeps entries in memory for inspection.

use chrono::SecondsFormat;
use serde_json::{Map, Value};
use std::io::Write;
use std::sync::Mutex;

use super::{LogEntry, Payload};
use crate::error::LogError;
use crate::resource::MonitoredResource;

const LABELS_FIELD: &str = "logging.googleapis.com/labels";
const TRACE_FIELD: &str = "logging.googleapis.com/trace";
const SPAN_ID_FIELD: &str = "logging.googleapis.com/spanId";
const TRACE_SAMPLED_FIELD: &str = "logging.googleapis.com/trace_sampled";

/// Destination for flushed log entries
pub trait LogSink: Send + Sync {
    fn write(
        &self,
        log_name: &str,
        resource: &MonitoredResource,
        entries: &[LogEntry],
    ) -> Result<(), LogError>;
}

/// Writes entries as newline-delimited JSON
pub struct StdoutSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StdoutSink {
    fn write(
        &self,
        log_name: &str,
        resource: &MonitoredResource,
        entries: &[LogEntry],
    ) -> Result<(), LogError> {
        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, &agent_json(log_name, resource, entry)?)?;
            buf.push(b'\n');
        }

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.write_all(&buf)?;
        writer.flush()?;
        Ok(())
    }
}

/// Render an entry as a structured-logging agent record
///
/// JSON object payloads are merged into the top level (they become the
/// entry's JSON payload); any other payload is reported as `message`.
pub fn agent_json(
    log_name: &str,
    resource: &MonitoredResource,
    entry: &LogEntry,
) -> Result<Value, LogError> {
    let mut record = match &entry.payload {
        Payload::Json(Value::Object(fields)) => fields.clone(),
        Payload::Json(other) => {
            let mut record = Map::new();
            record.insert("message".to_string(), other.clone());
            record
        }
        Payload::Text(message) => {
            let mut record = Map::new();
            record.insert("message".to_string(), Value::String(message.clone()));
            record
        }
    };

    record.insert(
        "severity".to_string(),
        Value::String(entry.severity.as_str().to_string()),
    );
    record.insert(
        "timestamp".to_string(),
        Value::String(entry.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)),
    );
    record.insert("logName".to_string(), Value::String(log_name.to_string()));
    record.insert("resource".to_string(), serde_json::to_value(resource)?);

    if !entry.labels.is_empty() {
        record.insert(LABELS_FIELD.to_string(), serde_json::to_value(&entry.labels)?);
    }

    if let Some(trace) = &entry.trace {
        record.insert(TRACE_FIELD.to_string(), Value::String(trace.trace.clone()));
        record.insert(SPAN_ID_FIELD.to_string(), Value::String(trace.span_id.clone()));
        record.insert(TRACE_SAMPLED_FIELD.to_string(), Value::Bool(trace.sampled));
    }

    Ok(Value::Object(record))
}

/// Keeps every written entry in memory
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries written so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl LogSink for MemorySink {
    fn write(
        &self,
        _log_name: &str,
        _resource: &MonitoredResource,
        entries: &[LogEntry],
    ) -> Result<(), LogError> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(entries);
        Ok(())
    }
}
