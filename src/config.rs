//! Configuration management for gcfexample
//!
//! Two sources feed the function:
//!
//! - [`FunctionEnv`]: the deployment identity (project, function name, region)
//!   that the platform injects through environment variables. Required, read
//!   once on first use.
//! - [`Settings`]: optional TOML file with server, handler, tracing,
//!   monitoring and observability knobs. Every section has defaults so the
//!   function runs without a file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{AppError, AppResult, ConfigError};

pub const PROJECT_ENV: &str = "GCP_PROJECT";
pub const FUNCTION_NAME_ENV: &str = "FUNCTION_NAME";
pub const REGION_ENV: &str = "FUNCTION_REGION";
pub const PORT_ENV: &str = "PORT";

/// Default metric written by the batch-attempts handler
pub const DEFAULT_METRIC_TYPE: &str = "custom.googleapis.com/dataops/gcfexample/ametric";

const CUSTOM_METRIC_PREFIX: &str = "custom.googleapis.com/";
const MAX_MONITORING_TIMEOUT_SECONDS: u64 = 300;

/// Deployment identity read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEnv {
    project_id: String,
    function_name: String,
    region: String,
}

impl FunctionEnv {
    /// Read the identity from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the identity through an arbitrary variable lookup
    ///
    /// Variables are checked in order (project, function name, region) and the
    /// first absent or blank one is reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingVariable(name))
        };

        Ok(Self {
            project_id: required(PROJECT_ENV)?,
            function_name: required(FUNCTION_NAME_ENV)?,
            region: required(REGION_ENV)?,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Root settings structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub handler: HandlerConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Which response the function produces
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandlerMode {
    /// Structured payload logging, custom metric write, random batch count reply
    #[default]
    BatchAttempts,
    /// Single log entry and a fixed greeting
    Greeting,
}

/// Request handler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlerConfig {
    #[serde(default)]
    pub mode: HandlerMode,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            mode: HandlerMode::default(),
            greeting: default_greeting(),
        }
    }
}

fn default_greeting() -> String {
    "Hello, World!".to_string()
}

/// Where finished spans are sent
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    #[default]
    Stdout,
    None,
}

impl ExporterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExporterKind::Stdout => "stdout",
            ExporterKind::None => "none",
        }
    }
}

/// Distributed tracing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TracingConfig {
    /// Fraction of request spans to sample, in [0.0, 1.0]
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,
    #[serde(default)]
    pub exporter: ExporterKind,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            sample_ratio: default_sample_ratio(),
            exporter: ExporterKind::default(),
        }
    }
}

fn default_sample_ratio() -> f64 {
    1.0
}

/// Custom metrics configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metric_type")]
    pub metric_type: String,
    #[serde(default = "default_monitoring_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_monitoring_timeout")]
    pub timeout_seconds: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metric_type: default_metric_type(),
            endpoint: default_monitoring_endpoint(),
            timeout_seconds: default_monitoring_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_metric_type() -> String {
    DEFAULT_METRIC_TYPE.to_string()
}

fn default_monitoring_endpoint() -> String {
    "https://monitoring.googleapis.com".to_string()
}

fn default_monitoring_timeout() -> u64 {
    10
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit service diagnostics as JSON instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let settings: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        settings
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(settings)
    }

    /// Load settings from `path` when given, otherwise use defaults
    ///
    /// The `PORT` environment variable, when set, overrides `server.port`.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            settings.server.port = port.trim().parse().map_err(|_| {
                AppError::Config(format!("{} must be a valid port number, got '{}'", PORT_ENV, port))
            })?;
        }

        Ok(settings)
    }

    /// Validate settings after parsing
    pub fn validate(&self) -> AppResult<()> {
        let ratio = self.tracing.sample_ratio;
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(AppError::Config(format!(
                "tracing.sample_ratio must be between 0.0 and 1.0, got {}",
                ratio
            )));
        }

        if !self.monitoring.metric_type.starts_with(CUSTOM_METRIC_PREFIX)
            || self.monitoring.metric_type.len() == CUSTOM_METRIC_PREFIX.len()
        {
            return Err(AppError::Config(format!(
                "monitoring.metric_type must be a {}* metric, got '{}'",
                CUSTOM_METRIC_PREFIX, self.monitoring.metric_type
            )));
        }

        let endpoint = &self.monitoring.endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(AppError::Config(format!(
                "monitoring.endpoint must start with http:// or https://, got '{}'",
                endpoint
            )));
        }

        let timeout = self.monitoring.timeout_seconds;
        if timeout == 0 || timeout > MAX_MONITORING_TIMEOUT_SECONDS {
            return Err(AppError::Config(format!(
                "monitoring.timeout_seconds must be in (0, {}], got {}",
                MAX_MONITORING_TIMEOUT_SECONDS, timeout
            )));
        }

        Ok(())
    }
}

impl FromStr for Settings {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let settings: Settings =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TEST_SETTINGS: &str = r#"
[server]
host = "127.0.0.1"
port = 9090

[handler]
mode = "greeting"
greeting = "Howdy"

[tracing]
sample_ratio = 0.1
exporter = "none"

[monitoring]
enabled = false
metric_type = "custom.googleapis.com/dataops/other"
endpoint = "http://localhost:8085"
timeout_seconds = 5

[observability]
log_level = "debug"
json = true
"#;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_function_env_reads_all_variables() {
        let env = FunctionEnv::from_lookup(lookup(&[
            ("GCP_PROJECT", "proj1"),
            ("FUNCTION_NAME", "fn1"),
            ("FUNCTION_REGION", "us-central1"),
        ]))
        .expect("should read env");

        assert_eq!(env.project_id(), "proj1");
        assert_eq!(env.function_name(), "fn1");
        assert_eq!(env.region(), "us-central1");
    }

    #[test]
    fn test_function_env_reports_each_missing_variable() {
        let all = [
            ("GCP_PROJECT", "proj1"),
            ("FUNCTION_NAME", "fn1"),
            ("FUNCTION_REGION", "us-central1"),
        ];

        for (missing, _) in all {
            let vars: Vec<_> = all.iter().copied().filter(|(k, _)| *k != missing).collect();
            let err = FunctionEnv::from_lookup(lookup(&vars)).unwrap_err();
            assert_eq!(err, ConfigError::MissingVariable(missing));
            assert!(err.to_string().contains(missing));
        }
    }

    #[test]
    fn test_function_env_treats_blank_as_missing() {
        let err = FunctionEnv::from_lookup(lookup(&[
            ("GCP_PROJECT", "proj1"),
            ("FUNCTION_NAME", "   "),
            ("FUNCTION_REGION", "us-central1"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingVariable("FUNCTION_NAME"));
    }

    #[test]
    fn test_settings_parse_all_sections() {
        let settings = Settings::from_str(TEST_SETTINGS).expect("should parse settings");
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.handler.mode, HandlerMode::Greeting);
        assert_eq!(settings.handler.greeting, "Howdy");
        assert_eq!(settings.tracing.sample_ratio, 0.1);
        assert_eq!(settings.tracing.exporter, ExporterKind::None);
        assert!(!settings.monitoring.enabled);
        assert_eq!(settings.monitoring.timeout_seconds, 5);
        assert_eq!(settings.observability.log_level, "debug");
        assert!(settings.observability.json);
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_str("").expect("empty settings should parse");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.handler.mode, HandlerMode::BatchAttempts);
        assert_eq!(settings.tracing.sample_ratio, 1.0);
        assert_eq!(settings.tracing.exporter, ExporterKind::Stdout);
        assert!(settings.monitoring.enabled);
        assert_eq!(settings.monitoring.metric_type, DEFAULT_METRIC_TYPE);
        assert_eq!(settings.observability.log_level, "info");
    }

    #[test]
    fn test_sample_ratio_out_of_range_fails() {
        for ratio in ["1.5", "-0.1", "nan"] {
            let toml = format!("[tracing]\nsample_ratio = {}\n", ratio);
            let result = Settings::from_str(&toml);
            assert!(result.is_err(), "ratio {} should be rejected", ratio);
        }
    }

    #[test]
    fn test_non_custom_metric_type_fails() {
        let result = Settings::from_str(
            "[monitoring]\nmetric_type = \"compute.googleapis.com/instance/cpu\"\n",
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("monitoring.metric_type"), "got: {}", err);
    }

    #[test]
    fn test_bare_custom_prefix_fails() {
        let result = Settings::from_str("[monitoring]\nmetric_type = \"custom.googleapis.com/\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_monitoring_endpoint_without_scheme_fails() {
        let result = Settings::from_str("[monitoring]\nendpoint = \"monitoring.googleapis.com\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_monitoring_timeout_bounds() {
        assert!(Settings::from_str("[monitoring]\ntimeout_seconds = 0\n").is_err());
        assert!(Settings::from_str("[monitoring]\ntimeout_seconds = 301\n").is_err());
        assert!(Settings::from_str("[monitoring]\ntimeout_seconds = 300\n").is_ok());
    }

    #[test]
    fn test_unknown_handler_mode_fails() {
        let result = Settings::from_str("[handler]\nmode = \"shouting\"\n");
        assert!(matches!(result, Err(AppError::ConfigParseFailed { .. })));
    }
}
