//! The function entry point
//!
//! Every request not claimed by `/health` or `/metrics` lands here. The
//! handler makes sure the shared clients exist, joins the caller's trace when
//! one is propagated, writes its log entries through the shared logger and
//! answers with a short plain-text body.

use axum::extract::{Request, State};
use chrono::Utc;
use opentelemetry::KeyValue;
use rand::Rng;
use serde::Serialize;

use crate::config::HandlerMode;
use crate::context::Initialized;
use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::logging::{FlushGuard, LogEntry, Severity, TraceLink};
use crate::metrics::{MonitoringOperation, RequestOutcome};
use crate::middleware::request_id::RequestId;
use crate::monitoring::{MetricDescriptor, TimeSeries};
use crate::trace;

/// Upper bound (exclusive) of the simulated batch attempt count
pub const MAX_BATCH_ATTEMPTS: i64 = 6;

/// Labels attached to the batch payload and metric failure entries
pub const BATCH_LABELS: [(&str, &str); 4] = [
    ("rsc", "3711"),
    ("r", "2138"),
    ("gri", "1908"),
    ("adg", "912"),
];

const REQUEST_MESSAGE: &str = "Handling new HTTP request";

#[derive(Serialize)]
struct BatchPayload {
    thing_one: &'static str,
    batch_size: i64,
}

/// Function handler
///
/// Returns `503 Service Unavailable` while the shared clients cannot be
/// built; otherwise always `200 OK`, including when the metric calls fail.
pub async fn handler(State(state): State<AppState>, request: Request) -> AppResult<String> {
    let init = match state.context().ensure_initialized().await {
        Ok(init) => init,
        Err(e) => {
            tracing::error!(error = %e, "Rejecting request: function clients unavailable");
            state.metrics().record_request(RequestOutcome::Unavailable);
            return Err(AppError::Unavailable(e));
        }
    };

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .copied()
        .unwrap_or_default();

    // Declared before the guard so the entries are flushed before the span ends
    let mut span = trace::start_request_span(init.tracer(), request.headers());
    if let Some(span) = span.as_mut() {
        span.set_attribute(KeyValue::new("http.request.method", request.method().to_string()));
        span.set_attribute(KeyValue::new("url.path", request.uri().path().to_string()));
    }
    let _flush = FlushGuard::new(init.logger().clone());

    let link = span
        .as_ref()
        .map(|span| TraceLink::new(init.env().project_id(), span.span_context()));
    let annotate = |entry: LogEntry| {
        entry
            .with_trace(link.clone())
            .with_label("request_id", request_id.to_string())
    };

    init.logger()
        .log(annotate(LogEntry::text(Severity::Info, REQUEST_MESSAGE)));

    let body = match state.settings().handler.mode {
        HandlerMode::Greeting => state.settings().handler.greeting.clone(),
        HandlerMode::BatchAttempts => {
            let batch_attempt = rand::rng().random_range(0..MAX_BATCH_ATTEMPTS);

            match LogEntry::structured(
                Severity::Info,
                &BatchPayload {
                    thing_one: "dafoolyouare",
                    batch_size: batch_attempt,
                },
            ) {
                Ok(entry) => init
                    .logger()
                    .log(annotate(entry.with_labels(BATCH_LABELS))),
                Err(e) => tracing::warn!(error = %e, "Failed to encode batch payload"),
            }

            for entry in record_batch_attempt(&state, &init, batch_attempt).await {
                init.logger().log(annotate(entry));
            }

            format!("016 Batch Attempts = {}", batch_attempt)
        }
    };

    state.metrics().record_request(RequestOutcome::Served);
    tracing::debug!(request_id = %request_id, traced = link.is_some(), "Request served");
    Ok(body)
}

/// Declare the custom metric and write one point for this request
///
/// Returns the ERROR entries describing any failed call. The two calls are
/// independent: a failed descriptor creation does not prevent the write.
async fn record_batch_attempt(
    state: &AppState,
    init: &Initialized,
    batch_attempt: i64,
) -> Vec<LogEntry> {
    let Some(client) = state.monitoring() else {
        return Vec::new();
    };
    if !state.settings().monitoring.enabled {
        return Vec::new();
    }

    let project_id = init.env().project_id();
    let metric_type = &state.settings().monitoring.metric_type;
    let mut failures = Vec::new();

    let descriptor = MetricDescriptor::int64_gauge(metric_type.as_str());
    if let Err(e) = client.create_metric_descriptor(project_id, &descriptor).await {
        tracing::warn!(error = %e, metric_type = %metric_type, "Metric descriptor creation failed");
        state
            .metrics()
            .monitoring_failure(MonitoringOperation::CreateDescriptor);
        failures.push(
            LogEntry::text(Severity::Error, format!("Unable to create MetricDescription {}", e))
                .with_labels(BATCH_LABELS),
        );
    }

    let series = TimeSeries::int64_gauge_point(
        project_id,
        metric_type.as_str(),
        batch_attempt,
        Utc::now(),
    );
    if let Err(e) = client.write_time_series(project_id, &[series]).await {
        tracing::warn!(error = %e, metric_type = %metric_type, "Time series write failed");
        state
            .metrics()
            .monitoring_failure(MonitoringOperation::WriteTimeSeries);
        failures.push(
            LogEntry::text(Severity::Error, format!("writeTimeSeriesValue failed {}", e))
                .with_labels(BATCH_LABELS),
        );
    }

    failures
}
