//! lightsail-sd Binary Entry Point
//!
//! Discovers AWS Lightsail instances and writes them to a Prometheus
//! `file_sd` target file. Core functionality is provided by the
//! `lightsail_sd` library crate.

use std::path::PathBuf;

use clap::Parser;
use lightsail_sd::{
    DiscoveryMetrics, Fetcher, LightsailClient, Publisher,
    config::{AppConfig, ConfigOverrides, parse_listen_address},
    metrics::register_process_collectors,
    publisher::DEFAULT_CHANNEL_CAPACITY,
    server::{AppState, create_router, serve},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Name used to tag the Lightsail fetcher's batches.
const FETCHER_NAME: &str = "lightsailSD";

/// Tool to generate file_sd target files for AWS Lightsail.
#[derive(Parser, Debug)]
#[command(name = "lightsail-sd", version, about, long_about = None)]
struct Cli {
    /// Path to an optional YAML configuration file
    #[arg(short, long, env = "LIGHTSAIL_SD_CONFIG")]
    config: Option<PathBuf>,

    /// Output file for file_sd compatible file [default: lightsail_sd.json]
    #[arg(long = "output.file", env = "LIGHTSAIL_SD_OUTPUT_FILE")]
    output_file: Option<PathBuf>,

    /// The refresh interval, in seconds or as a duration such as "1m" [default: 60]
    #[arg(long = "target.refresh", env = "LIGHTSAIL_SD_REFRESH")]
    refresh: Option<String>,

    /// AWS profile
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// AWS region (overrides the profile and environment)
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// The listen address [default: :9888]
    #[arg(long = "web.listen-address", env = "LIGHTSAIL_SD_LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// Path under which to expose metrics [default: /metrics]
    #[arg(long = "web.telemetry-path", env = "LIGHTSAIL_SD_TELEMETRY_PATH")]
    telemetry_path: Option<String>,
}

impl From<Cli> for ConfigOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            output_file: cli.output_file,
            refresh: cli.refresh,
            profile: cli.profile,
            region: cli.region,
            listen_address: cli.listen_address,
            telemetry_path: cli.telemetry_path,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lightsail_sd=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)
                .inspect_err(|e| tracing::error!(error = %e, "Invalid configuration"))?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    config.apply_overrides(cli.into())?;
    config
        .validate()
        .inspect_err(|e| tracing::error!(error = %e, "Invalid configuration"))?;
    let addr = parse_listen_address(&config.web.listen_address)?;

    tracing::info!(
        output = %config.output_file.display(),
        refresh = ?config.refresh_interval,
        listen = %addr,
        telemetry_path = %config.web.telemetry_path,
        "Starting lightsail-sd"
    );

    // Metrics
    let registry = prometheus::Registry::new();
    register_process_collectors(&registry)?;
    let metrics = DiscoveryMetrics::register(&registry)?;

    // AWS session
    let client =
        LightsailClient::connect(config.aws.profile.as_deref(), config.aws.region.as_deref())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Error creating session"))?;

    let cancel = CancellationToken::new();

    // Publisher first so the fetcher always has a consumer
    let (publisher, tx) = Publisher::new(&config.output_file, DEFAULT_CHANNEL_CAPACITY);
    tracing::debug!(output = %publisher.output().display(), "Publisher created");
    let publisher_handle = publisher.spawn(cancel.clone());

    let fetcher = Fetcher::new(FETCHER_NAME, client, config.refresh_interval, metrics);
    let fetcher_handle = tokio::spawn(fetcher.run(tx, cancel.clone()));

    let app = create_router(AppState {
        registry,
        telemetry_path: config.web.telemetry_path.clone(),
    });

    tokio::spawn(shutdown_signal(cancel.clone()));

    let served = serve(addr, app, cancel.clone()).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
    }

    // Stop background tasks whether the server exited cleanly or not
    cancel.cancel();
    if let Err(e) = fetcher_handle.await {
        tracing::error!(error = %e, "Fetcher task failed");
    }
    if let Err(e) = publisher_handle.await {
        tracing::error!(error = %e, "Publisher task failed");
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
        _ = cancel.cancelled() => return,
    }

    cancel.cancel();
}
