//! Monitoring API over REST
//!
//! Issues the v3 `metricDescriptors.create` and `timeSeries.create` calls with
//! a bearer token. Tokens come from a [`TokenSource`]; on a cloud function the
//! [`MetadataTokenSource`] asks the instance metadata server for the runtime
//! service account's token.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{MetricClient, MetricDescriptor, TimeSeries};
use crate::error::MonitoringError;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

// Tokens are refreshed this long before the reported expiry
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of OAuth2 access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, MonitoringError>;
}

/// Fixed token, for local runs against an emulator or tests
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String, MonitoringError> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Token from the instance metadata server, cached until shortly before expiry
pub struct MetadataTokenSource {
    http: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_url(http, METADATA_TOKEN_URL)
    }

    pub fn with_url(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn token(&self) -> Result<String, MonitoringError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let response = self
            .http
            .get(&self.url)
            .header(METADATA_FLAVOR_HEADER, "Google")
            .send()
            .await
            .map_err(|e| MonitoringError::Token(format!("metadata server unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitoringError::Token(format!(
                "metadata server returned {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| MonitoringError::Token(format!("malformed token response: {}", e)))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        tracing::debug!(expires_in = body.expires_in, "Fetched access token from metadata server");
        Ok(body.access_token)
    }
}

/// REST client for the monitoring API
pub struct CloudMonitoringClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: Box<dyn TokenSource>,
}

impl CloudMonitoringClient {
    /// Create a client for `endpoint` (scheme and host, no trailing path)
    pub fn new(http: reqwest::Client, endpoint: &str, tokens: Box<dyn TokenSource>) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn project_url(&self, project_id: &str, collection: &str) -> String {
        format!("{}/v3/projects/{}/{}", self.endpoint, project_id, collection)
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        url: String,
        body: &B,
    ) -> Result<reqwest::Response, MonitoringError> {
        let token = self.tokens.token().await?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|source| MonitoringError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitoringError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTimeSeriesRequest<'a> {
    time_series: &'a [TimeSeries],
}

#[async_trait]
impl MetricClient for CloudMonitoringClient {
    async fn create_metric_descriptor(
        &self,
        project_id: &str,
        descriptor: &MetricDescriptor,
    ) -> Result<MetricDescriptor, MonitoringError> {
        let url = self.project_url(project_id, "metricDescriptors");
        let response = self.post(url.clone(), descriptor).await?;

        let created: MetricDescriptor =
            response
                .json()
                .await
                .map_err(|source| MonitoringError::Transport { url, source })?;

        tracing::debug!(
            metric_type = %created.metric_type,
            name = ?created.name,
            "Metric descriptor created"
        );
        Ok(created)
    }

    async fn write_time_series(
        &self,
        project_id: &str,
        series: &[TimeSeries],
    ) -> Result<(), MonitoringError> {
        if series.is_empty() {
            return Err(MonitoringError::InvalidRequest(
                "at least one time series is required".to_string(),
            ));
        }

        let url = self.project_url(project_id, "timeSeries");
        self.post(url, &CreateTimeSeriesRequest { time_series: series })
            .await?;

        tracing::debug!(series_count = series.len(), "Time series written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_url_strips_trailing_slash() {
        let client = CloudMonitoringClient::new(
            reqwest::Client::new(),
            "https://monitoring.googleapis.com/",
            Box::new(StaticTokenSource::new("t")),
        );
        assert_eq!(
            client.project_url("proj1", "timeSeries"),
            "https://monitoring.googleapis.com/v3/projects/proj1/timeSeries"
        );
    }

    #[tokio::test]
    async fn test_static_token_source() {
        let source = StaticTokenSource::new("abc");
        assert_eq!(source.token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_empty_series_rejected_without_request() {
        let client = CloudMonitoringClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            Box::new(StaticTokenSource::new("t")),
        );
        let result = client.write_time_series("proj1", &[]).await;
        assert!(matches!(result, Err(MonitoringError::InvalidRequest(_))));
    }
}
