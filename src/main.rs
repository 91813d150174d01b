//! gcfexample HTTP server
//!
//! Starts an Axum web server that runs the function for every request.

use clap::Parser;
use gcfexample::{
    cli::{self, Cli, Command},
    config::Settings,
    context::{AppContext, CloudClientFactory},
    handlers::{self, AppState},
    metrics::Metrics,
    monitoring::{CloudMonitoringClient, MetadataTokenSource, MetricClient},
    telemetry,
};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::Config { output } = cli.subcommand() {
        let template = cli::generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                eprintln!("Configuration template written to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let settings = Arc::new(Settings::load(cli.config.as_deref())?);
    telemetry::init(
        &settings.observability.log_level,
        settings.observability.json,
    );

    let metrics = Metrics::new()?;
    let context = Arc::new(AppContext::new(
        settings.tracing.clone(),
        Arc::new(CloudClientFactory::new()),
        metrics.clone(),
    ));

    match cli.subcommand() {
        Command::Check => check(&context).await,
        Command::Serve { eager_init } => serve(settings, context, metrics, eager_init).await,
        Command::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// Run initialization once and report the outcome through the exit code
async fn check(context: &AppContext) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match context.ensure_initialized().await {
        Ok(init) => {
            println!(
                "Function clients ready for {} ({}, {})",
                init.env().function_name(),
                init.env().project_id(),
                init.env().region()
            );
            context.shutdown();
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Initialization failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn serve(
    settings: Arc<Settings>,
    context: Arc<AppContext>,
    metrics: Metrics,
    eager_init: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if eager_init && let Err(e) = context.ensure_initialized().await {
        tracing::error!(error = %e, "Eager initialization failed, not starting server");
        return Ok(ExitCode::FAILURE);
    }

    let mut state = AppState::new(settings.clone(), context.clone(), metrics);
    if settings.monitoring.enabled {
        state = state.with_monitoring(monitoring_client(&settings)?);
    }

    let addr = SocketAddr::from((
        settings
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        settings.server.port,
    ));

    tracing::info!(
        mode = ?settings.handler.mode,
        monitoring = settings.monitoring.enabled,
        sample_ratio = settings.tracing.sample_ratio,
        "Starting gcfexample on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Health check available at http://{}/health", addr);

    axum::serve(listener, handlers::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    context.shutdown();
    tracing::info!("Server stopped");
    Ok(ExitCode::SUCCESS)
}

fn monitoring_client(
    settings: &Settings,
) -> Result<Arc<dyn MetricClient>, Box<dyn std::error::Error>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.monitoring.timeout_seconds))
        .build()?;
    let tokens = MetadataTokenSource::new(http.clone());
    Ok(Arc::new(CloudMonitoringClient::new(
        http,
        &settings.monitoring.endpoint,
        Box::new(tokens),
    )))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
