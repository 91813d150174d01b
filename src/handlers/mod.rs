//! HTTP request handlers for gcfexample

use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::context::AppContext;
use crate::metrics::Metrics;
use crate::middleware::request_id::request_id_middleware;
use crate::monitoring::MetricClient;

pub mod function;
pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    context: Arc<AppContext>,
    metrics: Metrics,
    monitoring: Option<Arc<dyn MetricClient>>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, context: Arc<AppContext>, metrics: Metrics) -> Self {
        Self {
            settings,
            context,
            metrics,
            monitoring: None,
        }
    }

    /// Client used for the custom metric write
    ///
    /// Without one the handler skips the metric calls.
    pub fn with_monitoring(mut self, client: Arc<dyn MetricClient>) -> Self {
        self.monitoring = Some(client);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn monitoring(&self) -> Option<&Arc<dyn MetricClient>> {
        self.monitoring.as_ref()
    }
}

/// Build the application router
///
/// `/health` and `/metrics` are served directly; every other path and
/// method reaches the function handler.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .fallback(function::handler)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
