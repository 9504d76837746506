//! ipmi-power-exporter - version 0.1.0
//!
//! Prometheus exporter for BMC power-reading telemetry with tracing logging.
//! This is the main entry point that initializes the poll loop and HTTP
//! server, and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod state;

use axum::{routing::get, Router};
use clap::Parser;
use ipmi_power_exporter::{
    Accumulator, CommandRunner, Fetcher, Gatherer, ProcessRunner, PrometheusSink,
};
use prometheus::{Gauge, IntCounter, Registry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_config, command_test};
use config::{
    resolve_config, resolve_ipmitool_path, show_config, validate_effective_config, Config,
    DEFAULT_BIND_ADDR, DEFAULT_INTERVAL_SECS, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(_config: &Config, args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Builds the gatherer from effective config values.
pub(crate) fn build_gatherer(
    path: String,
    config: &Config,
    runner: Arc<dyn CommandRunner>,
) -> Gatherer {
    let fetcher = Fetcher {
        path,
        privilege: config.privilege.clone().unwrap_or_default(),
        use_sudo: config.use_sudo.unwrap_or(false),
        sample_period: config.sample_period.clone().unwrap_or_default(),
        timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        runner,
    };

    Gatherer::new(fetcher, config.servers.clone().unwrap_or_default())
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Completes when SIGINT is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install shutdown signal handler: {}", e);
        return;
    }
    info!("Received shutdown signal");
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        let config = load_validated_config(&args)?;

        return match command {
            Commands::Config { output, format } => {
                command_config(output.clone(), format.clone(), &config)
            }
            Commands::Test { iterations } => command_test(*iterations, &config).await,
        };
    }

    // Load configuration for main server mode
    let config = resolve_config(&args)?;

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&config, &args);

    info!("Starting ipmi-power-exporter");

    let path = resolve_ipmitool_path(&config);
    if path.is_empty() {
        warn!("⚠️  ipmitool not found on PATH - every poll cycle will fail until 'path' is configured");
    } else {
        info!("Using ipmitool at {}", path);
    }

    let targets = config.servers.as_ref().map_or(0, Vec::len);
    if targets == 0 {
        info!("No servers configured - polling the local machine");
    } else {
        info!("Polling {} remote BMC target(s)", targets);
    }

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    debug!("Prometheus registry initialized");

    let sink = Arc::new(PrometheusSink::new(&registry)?);
    let poll_duration = Gauge::new(
        "ipmi_exporter_poll_duration_seconds",
        "Time spent in the last gather cycle",
    )?;
    let poll_success = Gauge::new(
        "ipmi_exporter_poll_success",
        "Whether the last gather cycle completed without a fatal error (1) or failed (0)",
    )?;
    let polls_total = IntCounter::new(
        "ipmi_exporter_polls_total",
        "Number of gather cycles started since startup",
    )?;

    registry.register(Box::new(poll_duration.clone()))?;
    registry.register(Box::new(poll_success.clone()))?;
    registry.register(Box::new(polls_total.clone()))?;

    debug!("All metrics registered successfully");

    let gatherer = build_gatherer(path, &config, Arc::new(ProcessRunner));
    let interval_secs = config.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);

    // Background poll loop; overlapping cycles are prevented here by
    // delaying missed ticks rather than bursting.
    {
        let sink: Arc<dyn Accumulator> = sink.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                polls_total.inc();

                let start = Instant::now();
                match gatherer.gather(Arc::clone(&sink)).await {
                    Ok(()) => poll_success.set(1.0),
                    Err(e) => {
                        poll_success.set(0.0);
                        error!("Gather cycle failed: {}", e);
                    }
                }
                poll_duration.set(start.elapsed().as_secs_f64());
                debug!("Gather cycle finished in {:?}", start.elapsed());
            }
        });
    }

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR).to_string();
    let port = config.port.unwrap_or(DEFAULT_PORT);

    let shared_state: SharedState = Arc::new(AppState {
        registry,
        config: Arc::new(config),
        targets,
        start_time: Instant::now(),
    });

    let app = Router::new()
        .route("/", get(handlers::root_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(shared_state);

    let addr = SocketAddr::new(bind_ip_str.parse()?, port);
    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}
