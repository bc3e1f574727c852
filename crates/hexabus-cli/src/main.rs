//! Hexabus CLI - monitor and control Hexabus devices from the command line
//!
//! Watch the bus, list a device's endpoints, read and write values, and
//! switch smart plugs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod parse;

use config::CliConfig;
use parse::parse_device;

/// Hexabus - home-automation bus over IPv6 multicast
#[derive(Parser)]
#[command(name = "hexabus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "HEXABUS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print discoveries and endpoint updates until Ctrl+C
    Monitor {
        /// Devices to start discovery on right away
        #[arg(short, long, value_parser = parse_device)]
        device: Vec<SocketAddr>,
    },

    /// Discover a device and list its endpoints
    List {
        /// Device address, e.g. fe80::50:c4ff:fe04:819a%2
        #[arg(short, long, value_parser = parse_device)]
        device: SocketAddr,

        /// Seconds to wait for discovery (default from config)
        #[arg(short, long)]
        wait: Option<u64>,

        /// Print endpoints as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read the current value of an endpoint
    Read {
        #[arg(short, long, value_parser = parse_device)]
        device: SocketAddr,

        /// Endpoint id
        #[arg(short, long)]
        eid: u8,

        /// Seconds to wait for the answer
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Write a value to an endpoint, parsed per its declared kind
    Write {
        #[arg(short, long, value_parser = parse_device)]
        device: SocketAddr,

        /// Endpoint id
        #[arg(short, long)]
        eid: u8,

        /// Value to write (on/off, number, text, or a JSON datetime)
        value: String,
    },

    /// Switch a smart plug's relay
    Switch {
        #[arg(short, long, value_parser = parse_device)]
        device: SocketAddr,

        #[arg(value_enum)]
        state: SwitchState,
    },

    /// Show version and bus parameters
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum SwitchState {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;
    let config = CliConfig::load(cli.config.as_deref())?;

    // Handle Ctrl+C
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => warn!("Failed to listen for ctrl+c: {}", e),
        }
    });

    match cli.command {
        Commands::Monitor { device } => {
            commands::run_monitor(&config, device, &mut shutdown_rx).await?;
        }

        Commands::List {
            device,
            wait,
            json,
        } => {
            commands::run_list(&config, device, wait, json, &mut shutdown_rx).await?;
        }

        Commands::Read {
            device,
            eid,
            timeout,
        } => {
            commands::run_read(&config, device, eid, timeout).await?;
        }

        Commands::Write { device, eid, value } => {
            commands::run_write(&config, device, eid, &value).await?;
        }

        Commands::Switch { device, state } => {
            commands::run_switch(&config, device, matches!(state, SwitchState::On)).await?;
        }

        Commands::Info => {
            commands::print_info();
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_switch() {
        let cli =
            Cli::try_parse_from(["hexabus", "switch", "--device", "fe80::1%2", "on"]).unwrap();
        match cli.command {
            Commands::Switch { device, state } => {
                assert_eq!(device.port(), 61616);
                assert!(matches!(state, SwitchState::On));
            }
            _ => panic!("expected switch"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hexabus",
            "list",
            "-d",
            "[fe80::1]:61616",
            "--json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::List { json: true, .. }));
    }
}
