//! Trace propagation benchmarks
//!
//! Measures the per-request cost of reading inbound trace headers and of
//! rendering a log entry in the agent format. Neither touches the network.
//!
//! Run with: `cargo bench`

use axum::http::{HeaderMap, HeaderValue};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gcfexample::logging::{LogEntry, Severity};
use gcfexample::logging::sink::agent_json;
use gcfexample::resource::MonitoredResource;
use gcfexample::trace::{self, cloud_context};
use std::hint::black_box;

/// Benchmark the Cloud Trace header parser on valid and rejected input
fn bench_parse_header(c: &mut Criterion) {
    let cases = vec![
        ("sampled", "105445aa7843bc8bf206b12000100000/1;o=1"),
        ("no_options", "105445aa7843bc8bf206b12000100000/18446744073709551615"),
        ("malformed", "not-a-trace-header"),
    ];

    let mut group = c.benchmark_group("cloud_trace_parse");

    for (name, header) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &header, |b, h| {
            b.iter(|| cloud_context::parse_header(black_box(h)));
        });
    }

    group.finish();
}

/// Benchmark the composite extraction the handler runs on every request
fn bench_extract_remote_context(c: &mut Criterion) {
    let mut cloud = HeaderMap::new();
    cloud.insert(
        "x-cloud-trace-context",
        HeaderValue::from_static("105445aa7843bc8bf206b12000100000/1;o=1"),
    );

    let mut w3c = HeaderMap::new();
    w3c.insert(
        "traceparent",
        HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
    );

    let empty = HeaderMap::new();

    let mut group = c.benchmark_group("extract_remote_context");
    for (name, headers) in [("cloud", &cloud), ("w3c", &w3c), ("none", &empty)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), headers, |b, h| {
            b.iter(|| trace::extract_remote_context(black_box(h)));
        });
    }
    group.finish();
}

/// Benchmark rendering one structured entry as agent JSON
fn bench_agent_json(c: &mut Criterion) {
    let resource = MonitoredResource::cloud_function("fn1", "us-central1");
    let entry = LogEntry::structured(
        Severity::Info,
        &serde_json::json!({"thing_one": "dafoolyouare", "batch_size": 3}),
    )
    .expect("payload should serialize")
    .with_labels([("rsc", "3711"), ("r", "2138"), ("gri", "1908"), ("adg", "912")]);

    c.bench_function("agent_json_structured", |b| {
        b.iter(|| agent_json(black_box("projects/proj1/logs/fn1"), &resource, &entry));
    });
}

criterion_group!(
    benches,
    bench_parse_header,
    bench_extract_remote_context,
    bench_agent_json,
);
criterion_main!(benches);
