//! Process-wide application context
//!
//! Owns the clients every request shares: the logger bound to the function's
//! monitored resource and the tracer exporting request spans. They are built
//! lazily by the first request and at most once per context, even when many
//! requests arrive together on a cold start.
//!
//! A failed initialization is not cached. The request that triggered it is
//! rejected and the next request runs the initializer again, so fixing the
//! environment does not require a restart.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::{FunctionEnv, TracingConfig};
use crate::error::ConfigError;
use crate::logging::{LogSink, Logger, LoggingClient, StdoutSink};
use crate::metrics::{InitResult, Metrics};
use crate::resource::MonitoredResource;
use crate::trace::{self, TRACER_NAME};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Builds the external-service clients during initialization
pub trait ClientFactory: Send + Sync {
    /// Tracer provider exporting spans for the function's project
    fn tracer_provider(
        &self,
        env: &FunctionEnv,
        tracing: &TracingConfig,
    ) -> Result<SdkTracerProvider, BoxError>;

    /// Logging client bound to `project_id`
    fn logging_client(&self, project_id: &str) -> Result<LoggingClient, BoxError>;
}

/// Production factory: spans to the configured exporter, entries to stdout
pub struct CloudClientFactory {
    log_sink: Arc<dyn LogSink>,
}

impl CloudClientFactory {
    pub fn new() -> Self {
        Self::with_log_sink(Arc::new(StdoutSink::new()))
    }

    pub fn with_log_sink(log_sink: Arc<dyn LogSink>) -> Self {
        Self { log_sink }
    }
}

impl Default for CloudClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory for CloudClientFactory {
    fn tracer_provider(
        &self,
        env: &FunctionEnv,
        tracing: &TracingConfig,
    ) -> Result<SdkTracerProvider, BoxError> {
        if !tracing.sample_ratio.is_finite() {
            return Err(format!("invalid sample ratio {}", tracing.sample_ratio).into());
        }
        Ok(trace::build_tracer_provider(
            env,
            tracing.exporter,
            tracing.sample_ratio,
        ))
    }

    fn logging_client(&self, project_id: &str) -> Result<LoggingClient, BoxError> {
        Ok(LoggingClient::new(project_id, self.log_sink.clone())?)
    }
}

/// Shared state published once initialization succeeds
pub struct Initialized {
    env: FunctionEnv,
    logger: Arc<Logger>,
    tracer: SdkTracer,
    provider: SdkTracerProvider,
}

impl Initialized {
    pub fn env(&self) -> &FunctionEnv {
        &self.env
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn tracer(&self) -> &SdkTracer {
        &self.tracer
    }
}

/// Lazily initialized, process-wide clients
pub struct AppContext {
    tracing: TracingConfig,
    factory: Arc<dyn ClientFactory>,
    metrics: Metrics,
    env_lookup: Box<EnvLookup>,
    cell: OnceCell<Arc<Initialized>>,
}

impl AppContext {
    /// Context reading its identity from the process environment
    pub fn new(tracing: TracingConfig, factory: Arc<dyn ClientFactory>, metrics: Metrics) -> Self {
        Self {
            tracing,
            factory,
            metrics,
            env_lookup: Box::new(|name| std::env::var(name).ok()),
            cell: OnceCell::new(),
        }
    }

    /// Replace the environment lookup used by the initializer
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// Whether the shared clients are ready
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Initialize the shared clients if needed and return them
    ///
    /// Concurrent callers wait for a running initialization instead of
    /// starting their own. Once this has returned `Ok`, every later call
    /// returns the same instance without running the initializer.
    pub async fn ensure_initialized(&self) -> Result<Arc<Initialized>, ConfigError> {
        self.cell
            .get_or_try_init(|| async { self.initialize().map(Arc::new) })
            .await
            .cloned()
    }

    fn initialize(&self) -> Result<Initialized, ConfigError> {
        let result = self.build();
        match &result {
            Ok(init) => {
                self.metrics.init_attempt(InitResult::Success);
                tracing::info!(
                    project_id = %init.env.project_id(),
                    function_name = %init.env.function_name(),
                    region = %init.env.region(),
                    sample_ratio = self.tracing.sample_ratio,
                    exporter = self.tracing.exporter.as_str(),
                    "Function clients initialized"
                );
            }
            Err(e) => {
                self.metrics.init_attempt(InitResult::Failure);
                tracing::error!(error = %e, "Function client initialization failed");
            }
        }
        result
    }

    fn build(&self) -> Result<Initialized, ConfigError> {
        let env = FunctionEnv::from_lookup(|name| (self.env_lookup)(name))?;

        let provider = self
            .factory
            .tracer_provider(&env, &self.tracing)
            .map_err(|e| ConfigError::ExporterInitFailed(e.to_string()))?;
        let tracer = provider.tracer(TRACER_NAME);

        let client = match self.factory.logging_client(env.project_id()) {
            Ok(client) => client,
            Err(e) => {
                shutdown_provider(&provider);
                return Err(ConfigError::ClientInitFailed(e.to_string()));
            }
        };

        let resource = MonitoredResource::cloud_function(env.function_name(), env.region());
        let logger = client
            .logger(env.function_name(), resource)
            .with_metrics(self.metrics.clone());

        Ok(Initialized {
            env,
            logger: Arc::new(logger),
            tracer,
            provider,
        })
    }

    /// Flush pending log entries and shut down span export
    pub fn shutdown(&self) {
        let Some(init) = self.cell.get() else {
            return;
        };

        if let Err(e) = init.logger.flush() {
            tracing::warn!(error = %e, "Failed to flush log entries during shutdown");
        }
        shutdown_provider(&init.provider);
    }
}

fn shutdown_provider(provider: &SdkTracerProvider) {
    if let Err(e) = provider.shutdown() {
        tracing::warn!(error = %e, "Tracer provider shutdown failed");
    }
}
