//! Cloud Trace context propagation
//!
//! Google front ends attach an `X-Cloud-Trace-Context` header to requests:
//!
//! `X-Cloud-Trace-Context: 105445aa7843bc8bf206b12000100000/1;o=1`
//!
//! - trace id: 32 hex characters
//! - span id: unsigned 64-bit decimal
//! - `o=1` when the trace is sampled, `o=0` (or no option) otherwise

use opentelemetry::{
    Context,
    propagation::{Extractor, Injector, TextMapPropagator, text_map_propagator::FieldIter},
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
};
use std::sync::OnceLock;

pub const CLOUD_TRACE_CONTEXT_HEADER: &str = "x-cloud-trace-context";

const TRACE_ID_LEN: usize = 32;

static CLOUD_TRACE_HEADER_FIELDS: OnceLock<[String; 1]> = OnceLock::new();

fn cloud_trace_header_fields() -> &'static [String; 1] {
    CLOUD_TRACE_HEADER_FIELDS.get_or_init(|| [CLOUD_TRACE_CONTEXT_HEADER.to_owned()])
}

/// Propagates `SpanContext`s in the `X-Cloud-Trace-Context` format
#[derive(Clone, Debug, Default)]
pub struct CloudTraceContextPropagator {
    _private: (),
}

impl CloudTraceContextPropagator {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

/// Parse an `X-Cloud-Trace-Context` value
///
/// Returns `None` for anything malformed, including all-zero ids.
pub fn parse_header(value: &str) -> Option<SpanContext> {
    let (trace_part, rest) = value.trim().split_once('/')?;

    if trace_part.len() != TRACE_ID_LEN || !trace_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let trace_id = TraceId::from_hex(trace_part).ok()?;

    let (span_part, options) = match rest.split_once(';') {
        Some((span, options)) => (span, Some(options)),
        None => (rest, None),
    };
    if span_part.is_empty() || !span_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let span_id = SpanId::from_bytes(span_part.parse::<u64>().ok()?.to_be_bytes());

    let sampled = match options {
        None => false,
        Some(options) => match options.strip_prefix("o=")? {
            "1" => true,
            "0" => false,
            _ => return None,
        },
    };
    let trace_flags = if sampled {
        TraceFlags::SAMPLED
    } else {
        TraceFlags::default()
    };

    let span_context = SpanContext::new(trace_id, span_id, trace_flags, true, TraceState::default());
    span_context.is_valid().then_some(span_context)
}

/// Render a span context as an `X-Cloud-Trace-Context` value
pub fn format_header(span_context: &SpanContext) -> String {
    format!(
        "{}/{};o={}",
        span_context.trace_id(),
        u64::from_be_bytes(span_context.span_id().to_bytes()),
        if span_context.is_sampled() { 1 } else { 0 }
    )
}

impl TextMapPropagator for CloudTraceContextPropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            injector.set(CLOUD_TRACE_CONTEXT_HEADER, format_header(span_context));
        }
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        extractor
            .get(CLOUD_TRACE_CONTEXT_HEADER)
            .and_then(parse_header)
            .map(|sc| cx.with_remote_span_context(sc))
            .unwrap_or_else(|| cx.clone())
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(cloud_trace_header_fields())
    }
}
