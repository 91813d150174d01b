//! gcfexample - HTTP-triggered cloud function with observability integrations
//!
//! Demonstrates structured logging to a cloud logging backend, continuation of
//! inbound distributed traces, and best-effort custom metric writes, all behind
//! a lazily initialized, process-wide application context.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod monitoring;
pub mod resource;
pub mod telemetry;
pub mod trace;
