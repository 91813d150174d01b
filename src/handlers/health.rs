//! Health check endpoint
//!
//! Answers without touching the function clients, so load balancers can probe
//! the process before the first function request has arrived.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Whether the shared function clients have been built
    pub initialized: bool,
}

/// Health check handler
///
/// Always 200 OK. `initialized` stays false until a request (or
/// `serve --eager-init`) has built the clients successfully.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            initialized: state.context().is_initialized(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExporterKind, Settings, TracingConfig};
    use crate::context::{AppContext, CloudClientFactory};
    use crate::logging::MemorySink;
    use crate::metrics::Metrics;
    use std::sync::Arc;

    fn create_test_state() -> AppState {
        let metrics = Metrics::new().unwrap();
        let context = AppContext::new(
            TracingConfig {
                exporter: ExporterKind::None,
                ..TracingConfig::default()
            },
            Arc::new(CloudClientFactory::with_log_sink(Arc::new(MemorySink::new()))),
            metrics.clone(),
        )
        .with_env_lookup(|name| match name {
            "GCP_PROJECT" => Some("proj1".to_string()),
            "FUNCTION_NAME" => Some("fn1".to_string()),
            "FUNCTION_REGION" => Some("us-central1".to_string()),
            _ => None,
        });
        AppState::new(Arc::new(Settings::default()), Arc::new(context), metrics)
    }

    #[tokio::test]
    async fn test_health_handler_returns_ok_before_init() {
        let state = create_test_state();
        let (status, Json(body)) = handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "OK");
        assert!(!body.initialized);
    }

    #[tokio::test]
    async fn test_health_handler_reports_initialized() {
        let state = create_test_state();
        state.context().ensure_initialized().await.unwrap();

        let (status, Json(body)) = handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.initialized);
    }
}
