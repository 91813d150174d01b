//! Command-line interface for gcfexample
//!
//! Provides argument parsing and subcommand handling for the gcfexample binary.

use clap::{Parser, Subcommand};

/// HTTP function with structured logging, trace continuation and custom metrics
#[derive(Parser)]
#[command(name = "gcfexample")]
#[command(version)]
#[command(about = "HTTP function with structured logging, trace continuation and custom metrics")]
#[command(
    long_about = "gcfexample serves a single HTTP function. Each request writes structured \
    log entries bound to the function's monitored resource, joins the caller's trace when \
    one is propagated, and records a custom metric point. Function identity comes from the \
    GCP_PROJECT, FUNCTION_NAME and FUNCTION_REGION environment variables."
)]
pub struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (the default when no subcommand is given)
    Serve {
        /// Build the function clients before accepting traffic and exit on failure
        #[arg(long)]
        eager_init: bool,
    },
    /// Build the function clients once and report whether that succeeded
    Check,
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    /// Subcommand to run, with `serve` as the default
    pub fn subcommand(&self) -> Command {
        match &self.command {
            Some(Command::Serve { eager_init }) => Command::Serve {
                eager_init: *eager_init,
            },
            Some(Command::Check) => Command::Check,
            Some(Command::Config { output }) => Command::Config {
                output: output.clone(),
            },
            None => Command::Serve { eager_init: false },
        }
    }
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# gcfexample Configuration
# ========================
#
# Function identity is not configured here. It is read from the environment
# on the first request (or at startup with `serve --eager-init`):
#
#   GCP_PROJECT      project that receives logs, traces and metrics
#   FUNCTION_NAME    log name and monitored resource label
#   FUNCTION_REGION  monitored resource label
#
# PORT, when set, overrides server.port.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 8080

# ─────────────────────────────────────────────────────────────────────────────
# HANDLER
# ─────────────────────────────────────────────────────────────────────────────

[handler]
# Response mode:
#   - "batch_attempts": log a structured payload, write a custom metric point
#     and reply "016 Batch Attempts = N" with N drawn from [0, 6)
#   - "greeting": log one entry and reply with the greeting below
mode = "batch_attempts"

greeting = "Hello, World!"

# ─────────────────────────────────────────────────────────────────────────────
# TRACING
# ─────────────────────────────────────────────────────────────────────────────

[tracing]
# Fraction of request spans to sample (0.0 to 1.0)
sample_ratio = 1.0

# Span exporter: "stdout" or "none"
exporter = "stdout"

# ─────────────────────────────────────────────────────────────────────────────
# CUSTOM METRICS
# ─────────────────────────────────────────────────────────────────────────────

[monitoring]
# Write one gauge point per request in batch_attempts mode
enabled = true

# Must start with custom.googleapis.com/
metric_type = "custom.googleapis.com/dataops/gcfexample/ametric"

# Monitoring API endpoint (scheme and host)
endpoint = "https://monitoring.googleapis.com"

# Per-call timeout in seconds (1 to 300)
timeout_seconds = 10

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Level for the service's own diagnostics: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Emit the service's own diagnostics as JSON
json = false

# Prometheus metrics are always available at /metrics on the server port
"#
}
