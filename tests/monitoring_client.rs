//! Integration tests for the monitoring REST client
//!
//! A wiremock server stands in for both the monitoring API and the instance
//! metadata server, so the exact requests the function sends can be verified.

use chrono::{TimeZone, Utc};
use gcfexample::error::MonitoringError;
use gcfexample::monitoring::{
    CloudMonitoringClient, MetadataTokenSource, MetricClient, MetricDescriptor, StaticTokenSource,
    TimeSeries, TokenSource,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const METRIC_TYPE: &str = "custom.googleapis.com/dataops/gcfexample/ametric";

fn client(server: &MockServer) -> CloudMonitoringClient {
    CloudMonitoringClient::new(
        reqwest::Client::new(),
        &server.uri(),
        Box::new(StaticTokenSource::new("test-token")),
    )
}

fn series(value: i64) -> TimeSeries {
    TimeSeries::int64_gauge_point(
        "proj1",
        METRIC_TYPE,
        value,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_create_descriptor_posts_to_project_collection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/projects/proj1/metricDescriptors"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "type": METRIC_TYPE,
            "metricKind": "GAUGE",
            "valueType": "INT64",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": format!("projects/proj1/metricDescriptors/{}", METRIC_TYPE),
            "type": METRIC_TYPE,
            "metricKind": "GAUGE",
            "valueType": "INT64",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .create_metric_descriptor("proj1", &MetricDescriptor::int64_gauge(METRIC_TYPE))
        .await
        .expect("descriptor creation should succeed");

    assert_eq!(
        created.name.as_deref(),
        Some("projects/proj1/metricDescriptors/custom.googleapis.com/dataops/gcfexample/ametric")
    );
}

#[tokio::test]
async fn test_write_time_series_sends_single_point() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/projects/proj1/timeSeries"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "timeSeries": [{
                "metric": {
                    "type": METRIC_TYPE,
                    "labels": { "environment": "STAGING" }
                },
                "resource": {
                    "type": "global",
                    "labels": { "project_id": "proj1" }
                },
                "points": [{
                    "interval": { "endTime": "2024-05-01T12:00:00.000000Z" },
                    "value": { "int64Value": "3" }
                }]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .write_time_series("proj1", &[series(3)])
        .await
        .expect("write should succeed");
}

#[tokio::test]
async fn test_api_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/projects/proj1/timeSeries"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = client(&server)
        .write_time_series("proj1", &[series(1)])
        .await
        .expect_err("non-2xx should fail");

    match err {
        MonitoringError::Api { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_requests_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/projects/proj1/metricDescriptors"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .create_metric_descriptor("proj1", &MetricDescriptor::int64_gauge(METRIC_TYPE))
        .await;

    assert!(matches!(result, Err(MonitoringError::Api { status: 503, .. })));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let client = CloudMonitoringClient::new(
        reqwest::Client::new(),
        "http://127.0.0.1:9",
        Box::new(StaticTokenSource::new("t")),
    );

    let err = client
        .write_time_series("proj1", &[series(1)])
        .await
        .expect_err("connection should fail");

    assert!(matches!(err, MonitoringError::Transport { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_metadata_token_is_fetched_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "metadata-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source =
        MetadataTokenSource::with_url(reqwest::Client::new(), format!("{}/token", server.uri()));

    assert_eq!(source.token().await.unwrap(), "metadata-token");
    assert_eq!(source.token().await.unwrap(), "metadata-token");
}

#[tokio::test]
async fn test_metadata_token_failure_surfaces_as_token_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = CloudMonitoringClient::new(
        reqwest::Client::new(),
        &server.uri(),
        Box::new(MetadataTokenSource::with_url(
            reqwest::Client::new(),
            format!("{}/token", server.uri()),
        )),
    );

    let err = client
        .write_time_series("proj1", &[series(1)])
        .await
        .expect_err("token failure should fail the call");

    assert!(matches!(err, MonitoringError::Token(_)), "got {:?}", err);
}
