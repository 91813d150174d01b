//! Custom metrics
//!
//! Types mirroring the monitoring API's metric descriptor and time series
//! resources, and the [`MetricClient`] seam the request handler writes through.
//! [`CloudMonitoringClient`] is the REST implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MonitoringError;
use crate::resource::MonitoredResource;

pub mod rest;

pub use rest::{CloudMonitoringClient, MetadataTokenSource, StaticTokenSource, TokenSource};

/// Label value attached to every point written by the function
pub const ENVIRONMENT_LABEL: &str = "environment";
pub const ENVIRONMENT: &str = "STAGING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    Gauge,
    Delta,
    Cumulative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Bool,
    Int64,
    Double,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDescriptor {
    pub key: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDescriptor {
    /// Resource name assigned by the API; absent on create requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub metric_kind: MetricKind,
    pub value_type: ValueType,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub labels: Vec<LabelDescriptor>,
}

impl MetricDescriptor {
    /// Integer gauge labelled by environment, as written by the handler
    pub fn int64_gauge(metric_type: impl Into<String>) -> Self {
        Self {
            name: None,
            metric_type: metric_type.into(),
            metric_kind: MetricKind::Gauge,
            value_type: ValueType::Int64,
            unit: "items".to_string(),
            description: "Batch attempts made by the example function".to_string(),
            display_name: "Batch attempts".to_string(),
            labels: vec![LabelDescriptor {
                key: ENVIRONMENT_LABEL.to_string(),
                value_type: ValueType::String,
                description: "An arbitrary measurement".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

impl TimeInterval {
    /// Single instant, as used by gauge points
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            end_time: time.to_rfc3339_opts(SecondsFormat::Micros, true),
            start_time: None,
        }
    }
}

/// Point value; 64-bit integers travel as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    pub int64_value: String,
}

impl TypedValue {
    pub fn int64(value: i64) -> Self {
        Self {
            int64_value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub interval: TimeInterval,
    pub value: TypedValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub metric: Metric,
    pub resource: MonitoredResource,
    pub points: Vec<Point>,
}

impl TimeSeries {
    /// One gauge point for `metric_type`, attributed to the project
    pub fn int64_gauge_point(
        project_id: &str,
        metric_type: impl Into<String>,
        value: i64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            metric: Metric {
                metric_type: metric_type.into(),
                labels: BTreeMap::from([(ENVIRONMENT_LABEL.to_string(), ENVIRONMENT.to_string())]),
            },
            resource: MonitoredResource::global(project_id),
            points: vec![Point {
                interval: TimeInterval::at(at),
                value: TypedValue::int64(value),
            }],
        }
    }
}

/// Client for the custom-metrics API
///
/// Calls are made once; implementations do not retry.
#[async_trait]
pub trait MetricClient: Send + Sync {
    /// Create (or re-declare) a metric descriptor in `project_id`
    async fn create_metric_descriptor(
        &self,
        project_id: &str,
        descriptor: &MetricDescriptor,
    ) -> Result<MetricDescriptor, MonitoringError>;

    /// Write points to one or more time series in `project_id`
    async fn write_time_series(
        &self,
        project_id: &str,
        series: &[TimeSeries],
    ) -> Result<(), MonitoringError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_descriptor_serializes_to_api_shape() {
        let descriptor = MetricDescriptor::int64_gauge("custom.googleapis.com/dataops/gcfexample/ametric");
        let json = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(json["type"], "custom.googleapis.com/dataops/gcfexample/ametric");
        assert_eq!(json["metricKind"], "GAUGE");
        assert_eq!(json["valueType"], "INT64");
        assert_eq!(json["labels"][0]["key"], "environment");
        assert_eq!(json["labels"][0]["valueType"], "STRING");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_descriptor_deserializes_api_response() {
        let json = r#"{
            "name": "projects/proj1/metricDescriptors/custom.googleapis.com/x",
            "type": "custom.googleapis.com/x",
            "metricKind": "GAUGE",
            "valueType": "INT64"
        }"#;
        let descriptor: MetricDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(
            descriptor.name.as_deref(),
            Some("projects/proj1/metricDescriptors/custom.googleapis.com/x")
        );
        assert!(descriptor.labels.is_empty());
    }

    #[test]
    fn test_time_series_serializes_to_api_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let series = TimeSeries::int64_gauge_point("proj1", "custom.googleapis.com/x", 4, at);
        let json = serde_json::to_value(&series).unwrap();

        assert_eq!(json["metric"]["type"], "custom.googleapis.com/x");
        assert_eq!(json["metric"]["labels"]["environment"], "STAGING");
        assert_eq!(json["resource"]["type"], "global");
        assert_eq!(json["resource"]["labels"]["project_id"], "proj1");
        assert_eq!(json["points"][0]["value"]["int64Value"], "4");
        assert_eq!(
            json["points"][0]["interval"]["endTime"],
            "2024-05-01T12:00:00.000000Z"
        );
        assert!(json["points"][0]["interval"].get("startTime").is_none());
    }
}
