//! fulcrum simulation driver
//!
//! Registers a set of servers, starts health checking and routes a batch of
//! concurrent requests through the load balancer.

use anyhow::Context;
use clap::Parser;
use fulcrum_balancer::LoadBalancer;
use fulcrum_core::{BalancerConfig, LoadBalanceStrategy, LoggingConfig};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::FmtSubscriber;

/// fulcrum-sim - route simulated requests through the load balancer
#[derive(Parser, Debug)]
#[command(name = "fulcrum-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load balancing strategy (round-robin, least-connections)
    #[arg(long)]
    strategy: Option<LoadBalanceStrategy>,

    /// Server id to register (repeatable)
    #[arg(long = "server")]
    servers: Vec<String>,

    /// Starting load per server, comma separated (e.g. 4,3,5)
    #[arg(long, value_delimiter = ',')]
    initial_connections: Vec<usize>,

    /// Number of concurrent requests to simulate
    #[arg(long, default_value_t = 10)]
    requests: usize,

    /// Simulated processing time per request in milliseconds
    #[arg(long, default_value_t = 1000)]
    work_ms: u64,

    /// Health check interval in seconds
    #[arg(long)]
    health_interval_secs: Option<u64>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the final server status as JSON
    #[arg(long)]
    json: bool,
}

const DEFAULT_SERVERS: [&str; 3] = ["Server1", "Server2", "Server3"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging(&config.logging)?;

    info!(
        "Starting fulcrum-sim v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.strategy
    );

    let lb = Arc::new(LoadBalancer::from_config(&config).context("Failed to register servers")?);

    if config.health.enabled {
        lb.start_health_loop(config.health.interval())?;
    }

    let tasks = (0..args.requests).map(|request| {
        let lb = lb.clone();
        let work = Duration::from_millis(args.work_ms);
        tokio::spawn(async move {
            match lb.choose_guarded() {
                Some(server) => {
                    info!(request, server = %server.id(), "Request routed");
                    tokio::time::sleep(work).await;
                }
                None => warn!(request, "No healthy servers available"),
            }
        })
    });

    for result in futures::future::join_all(tasks).await {
        if let Err(e) = result {
            warn!(error = %e, "Request task failed");
        }
    }

    lb.stop_health_loop().await;

    let statuses = lb.statuses();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        for status in &statuses {
            println!("{}", status);
        }
    }

    Ok(())
}

/// Merge the optional config file with command-line overrides
fn load_config(args: &Args) -> anyhow::Result<BalancerConfig> {
    let mut config = match &args.config {
        Some(path) => BalancerConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => BalancerConfig::default(),
    };

    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if !args.servers.is_empty() {
        config.servers = args.servers.clone();
    }
    if config.servers.is_empty() {
        config.servers = DEFAULT_SERVERS.iter().map(|s| s.to_string()).collect();
    }
    if !args.initial_connections.is_empty() {
        config.initial_connections = args.initial_connections.clone();
    }
    if let Some(secs) = args.health_interval_secs {
        config.health.interval_secs = secs;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(file) = &args.log_file {
        config.logging.file = Some(file.clone());
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(logging.file.is_none())
        .with_writer(log_writer(logging)?);

    let result = if logging.format == "json" {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.context("Failed to set subscriber")
}

/// Log destination: the configured file in append mode, otherwise stdout
fn log_writer(logging: &LoggingConfig) -> anyhow::Result<BoxMakeWriter> {
    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Ok(BoxMakeWriter::new(std::sync::Mutex::new(file)))
        }
        None => Ok(BoxMakeWriter::new(std::io::stdout)),
    }
}
