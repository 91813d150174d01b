//! Diagnostics for the service itself
//!
//! Configures `tracing-subscriber` for the process's own messages. These go to
//! stderr so they never interleave with the structured function log entries
//! written to stdout.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Filter directives used when `RUST_LOG` is not set
pub fn default_directives(level: &str) -> String {
    format!("gcfexample={},tower_http=debug", level)
}

/// Initialize the tracing subscriber
///
/// This can only be called once per process. Subsequent calls are silently ignored.
///
/// Reads the filter from `RUST_LOG`, falling back to `default_level` for this
/// crate. With `json` set, each event is one JSON object.
///
/// # Examples
///
/// ```no_run
/// gcfexample::telemetry::init("info", false);
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str, json: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_crate_level() {
        assert_eq!(default_directives("debug"), "gcfexample=debug,tower_http=debug");
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(default_directives("warn")).is_ok());
    }
}
