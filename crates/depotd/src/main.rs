//! `depotd`: the Depot storage node daemon.
//!
//! Accepts uploads, existence queries and downloads on the upload port,
//! registers with the configured trackers and optionally serves downloads
//! over HTTP.
//!
//! # Usage
//!
//! ```text
//! depotd start                                   # start with defaults
//! depotd start -c depot.toml                     # start with a config file
//! depotd start -b ./node2 -p 4840                # second instance
//! depotd start --tracker 10.0.0.1:4800           # register with a tracker
//! depotd check-config -c depot.toml              # validate and print
//! ```

mod config;
mod http;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use depot_node::{Catalog, NodeContext, NoopCatalog, start_registrars};
use depot_store::FileStore;
use tracing::{error, info};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "depotd", version, about = "Depot content-addressed storage node")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the storage node.
    Start(StartArgs),

    /// Validate the configuration and print the effective settings.
    CheckConfig,
}

#[derive(Args)]
struct StartArgs {
    /// Override the storage base path.
    #[arg(short, long)]
    base_path: Option<PathBuf>,

    /// Override the upload port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Tracker address (`host:port`). Can be specified multiple times;
    /// replaces the configured list.
    #[arg(short, long)]
    tracker: Vec<String>,

    /// Shared secret presented to trackers.
    #[arg(long, env = "DEPOT_SECRET")]
    secret: Option<String>,
}

impl StartArgs {
    /// CLI args override config file values.
    fn apply(self, config: &mut CliConfig) {
        if let Some(base) = self.base_path {
            config.node.base_path = base;
        }
        if let Some(port) = self.port {
            config.node.port = port;
        }
        if !self.tracker.is_empty() {
            config.tracker.trackers = self.tracker.join(",");
        }
        if let Some(s) = self.secret {
            config.node.secret = s;
        }
    }
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Start(args) => {
            args.apply(&mut config);
            cmd_start(config).await
        }
        Commands::CheckConfig => cmd_check_config(&config),
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// -----------------------------------------------------------------------
// depotd start
// -----------------------------------------------------------------------

async fn cmd_start(config: CliConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;

    info!("starting depotd");
    info!(
        base_path = %config.node.base_path.display(),
        bind_address = %config.node.bind_address,
        port = config.node.port,
        group = %config.node.group,
        instance_id = %config.node.instance_id,
        workers = config.pool.workers,
        queue = config.pool.queue,
        "node configuration"
    );
    if config.node.secret.is_empty() {
        info!("no tracker secret configured");
    }

    // --- Catalog ---
    NoopCatalog
        .init()
        .await
        .context("failed to initialize catalog")?;

    // --- Blob store ---
    let store = FileStore::new(&config.node.base_path).context("failed to initialize file store")?;
    info!(path = %store.base_dir().display(), "using file store");

    let ctx = NodeContext::new(config.node_config(), store);

    // --- Tracker registration ---
    let registrars = start_registrars(&ctx, &config.trackers());
    info!(trackers = registrars.len(), "registrars started");

    // --- HTTP download passthrough ---
    if config.http.enabled {
        let ctx = ctx.clone();
        let addr = config.http_addr();
        tokio::spawn(async move {
            if let Err(e) = http::serve(ctx, &addr).await {
                error!(%addr, %e, "http download passthrough stopped");
            }
        });
    }

    // --- Upload port ---
    tokio::select! {
        result = depot_node::serve(ctx) => {
            result.context("upload listener failed")?;
        }
        result = shutdown_signal() => {
            result.context("failed to listen for shutdown signal")?;
            info!("shutdown signal received, exiting");
        }
    }

    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}

// -----------------------------------------------------------------------
// depotd check-config
// -----------------------------------------------------------------------

fn cmd_check_config(config: &CliConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let trackers = config.trackers();
    println!("Depot Node Configuration");
    println!("========================");
    println!("  Base path:   {}", config.node.base_path.display());
    println!(
        "  Upload port: {}:{}",
        config.node.bind_address, config.node.port
    );
    println!("  Group:       {}", config.node.group);
    println!("  Instance:    {}", config.node.instance_id);
    println!(
        "  Pool:        {} workers, {} queued",
        config.pool.workers, config.pool.queue
    );
    if trackers.is_empty() {
        println!("  Trackers:    none (stand-alone)");
    } else {
        println!("  Trackers:    {}", trackers.join(", "));
        println!("  Interval:    {}s", config.tracker.interval_secs);
    }
    if config.http.enabled {
        println!("  HTTP:        {}", config.http_addr());
    } else {
        println!("  HTTP:        disabled");
    }
    Ok(())
}
