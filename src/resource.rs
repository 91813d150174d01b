//! Monitored resource descriptors
//!
//! Both log entries and time series are attributed to a monitored resource:
//! a resource type plus a small set of identifying labels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource type used for log entries emitted by a cloud function
pub const CLOUD_FUNCTION: &str = "cloud_function";

/// Resource type used for custom metric time series
pub const GLOBAL: &str = "global";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

impl MonitoredResource {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Resource describing a deployed cloud function
    pub fn cloud_function(function_name: &str, region: &str) -> Self {
        Self::new(CLOUD_FUNCTION)
            .with_label("function_name", function_name)
            .with_label("region", region)
    }

    /// Project-scoped resource with no further location
    pub fn global(project_id: &str) -> Self {
        Self::new(GLOBAL).with_label("project_id", project_id)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_function_resource_labels() {
        let resource = MonitoredResource::cloud_function("fn1", "us-central1");
        assert_eq!(resource.kind(), "cloud_function");
        assert_eq!(resource.label("function_name"), Some("fn1"));
        assert_eq!(resource.label("region"), Some("us-central1"));
        assert_eq!(resource.labels().len(), 2);
    }

    #[test]
    fn test_resource_serializes_type_field() {
        let resource = MonitoredResource::global("proj1");
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "global", "labels": {"project_id": "proj1"}})
        );
    }
}
