//! Distributed tracing
//!
//! Builds the tracer provider that exports request spans and continues inbound
//! traces. A request span is only started when the request carries a valid
//! remote context in either the `X-Cloud-Trace-Context` or W3C `traceparent`
//! header; requests without one are not traced.

use axum::http::HeaderMap;
use opentelemetry::{
    Context, KeyValue,
    propagation::{TextMapCompositePropagator, TextMapPropagator},
    trace::{Span as _, SpanContext, SpanKind, TraceContextExt, Tracer as _},
};
use opentelemetry_http::HeaderExtractor;
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracer, SdkTracerProvider, Span},
};

use crate::config::{ExporterKind, FunctionEnv};

pub mod cloud_context;

pub use cloud_context::{CLOUD_TRACE_CONTEXT_HEADER, CloudTraceContextPropagator};

/// Instrumentation scope name for spans created by the function
pub const TRACER_NAME: &str = "gcfexample";

/// Name of the server span started for each traced request
pub const REQUEST_SPAN_NAME: &str = "helloworld";

/// Sampler for a configured ratio
///
/// Ratios at or above 1.0 always sample and ratios at or below 0.0 never
/// sample; anything in between samples by trace id.
pub fn build_sampler(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

/// Resource attached to every exported span
pub fn function_resource(env: &FunctionEnv) -> Resource {
    Resource::builder()
        .with_service_name(env.function_name().to_string())
        .with_attributes([
            KeyValue::new("cloud.provider", "gcp"),
            KeyValue::new("cloud.account.id", env.project_id().to_string()),
            KeyValue::new("cloud.region", env.region().to_string()),
            KeyValue::new("faas.name", env.function_name().to_string()),
        ])
        .build()
}

/// Tracer provider exporting to the configured destination
pub fn build_tracer_provider(
    env: &FunctionEnv,
    exporter: ExporterKind,
    sample_ratio: f64,
) -> SdkTracerProvider {
    let builder = SdkTracerProvider::builder()
        .with_sampler(build_sampler(sample_ratio))
        .with_resource(function_resource(env));

    match exporter {
        ExporterKind::Stdout => builder
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build(),
        ExporterKind::None => builder.build(),
    }
}

/// Propagator accepting both Cloud Trace and W3C headers
///
/// When both are present the W3C `traceparent` header wins.
pub fn request_propagator() -> TextMapCompositePropagator {
    TextMapCompositePropagator::new(vec![
        Box::new(CloudTraceContextPropagator::new()),
        Box::new(TraceContextPropagator::new()),
    ])
}

/// Remote parent context carried by request headers, if any
pub fn extract_remote_context(headers: &HeaderMap) -> Option<Context> {
    let cx = request_propagator().extract(&HeaderExtractor(headers));
    cx.span().span_context().is_valid().then_some(cx)
}

/// Server span covering one request
///
/// The span ends when this value is dropped, so every exit path of the
/// handler closes it.
pub struct RequestSpan {
    span: Span,
}

impl RequestSpan {
    pub fn span_context(&self) -> &SpanContext {
        self.span.span_context()
    }

    pub fn set_attribute(&mut self, attribute: KeyValue) {
        self.span.set_attribute(attribute);
    }
}

/// Start a request span if the headers carry a remote parent
pub fn start_request_span(tracer: &SdkTracer, headers: &HeaderMap) -> Option<RequestSpan> {
    let parent = extract_remote_context(headers)?;
    let span = tracer
        .span_builder(REQUEST_SPAN_NAME)
        .with_kind(SpanKind::Server)
        .start_with_context(tracer, &parent);
    Some(RequestSpan { span })
}
