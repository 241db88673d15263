//! gapi-ms: gapi microservice client.
//!
//! Connects to the gateway, identifies itself with a guid, keeps the
//! connection alive, and answers framed requests with the echo handler
//! until Ctrl-C.

mod config;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use gapi_client::{ConnectionConfig, EchoHandler, GapiClient, WebSocketConnector};

/// gapi-ms: gapi microservice client
#[derive(Parser)]
#[command(name = "gapi-ms", version, about = "Persistent WebSocket client for the gapi microservice gateway")]
struct Cli {
    /// WebSocket server address (ws:// or wss://)
    server_address: String,

    /// GUID presented to the gateway in the hello message
    guid: String,

    /// Reconnect time in seconds (default: 6)
    #[arg(long = "reconnect-time")]
    reconnect_time: Option<u64>,

    /// Keep-alive message time in seconds (default: 60)
    #[arg(long = "keep-alive-time")]
    keep_alive_time: Option<u64>,

    /// Config file path (default: ~/.gapi/config.toml)
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("gapi-ms: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load config file; CLI flags override it.
    let config_path = cli.config.clone().unwrap_or_else(config::Config::default_path);
    let cfg = config::Config::load(&config_path)?;

    let log_file = cli.log_file.clone().or(cfg.client.log_file.clone());
    init_tracing(cli.verbose, log_file.as_deref())?;

    let reconnect_time = config::require_positive(
        "reconnect-time",
        cli.reconnect_time.unwrap_or(cfg.client.reconnect_time),
    )?;
    let keep_alive_time = config::require_positive(
        "keep-alive-time",
        cli.keep_alive_time.unwrap_or(cfg.client.keep_alive_time),
    )?;
    gapi_client::transport::check_scheme(&cli.server_address)?;

    let connection = ConnectionConfig::new(&cli.server_address, &cli.guid)
        .with_reconnect_delay(Duration::from_secs(reconnect_time))
        .with_keepalive_interval(Duration::from_secs(keep_alive_time));
    info!(
        url = %connection.url,
        guid = %connection.guid,
        reconnect_time,
        keep_alive_time,
        "starting"
    );

    let client = GapiClient::new(connection, WebSocketConnector::new(), EchoHandler).spawn();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    println!("Ctrl+C pressed, exiting gracefully");

    client.shutdown();
    client.join().await.context("client task panicked")?;
    info!("stopped");
    Ok(())
}

/// Install the global subscriber: stdout always, plus an optional log file.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_filter = if verbose {
        "gapi_ms=debug,gapi_client=debug,gapi_core=debug"
    } else {
        "gapi_ms=info,gapi_client=info,gapi_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose))
        .with(file_layer)
        .init();
    Ok(())
}
