//! Subcommand implementations

use anyhow::{bail, Context, Result};
use colored::Colorize;
use hexabus_client::plug::SWITCH_EID;
use hexabus_client::{
    Device, DeviceEvent, Endpoint, EndpointEvent, Hexabus, DEFAULT_QUERY_TIMEOUT,
};
use hexabus_core::{Data, Packet, Payload, DEFAULT_PORT, MAX_PACKET_SIZE, MULTICAST_GROUP};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::CliConfig;
use crate::parse::parse_value;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

async fn open_bus(config: &CliConfig) -> Result<Hexabus> {
    let bus = Hexabus::builder()
        .config(config.channel.clone())
        .event_capacity(config.event_capacity)
        .open()
        .await
        .context("Failed to open the Hexabus channel")?;
    Ok(bus)
}

pub async fn run_monitor(
    config: &CliConfig,
    devices: Vec<SocketAddr>,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    let bus = open_bus(config).await?;
    let mut discoveries = bus.discoveries();
    let (tx, mut rx) = mpsc::channel::<EndpointEvent>(config.event_capacity.max(1));

    println!(
        "{} Monitoring {} (Ctrl+C to stop)",
        "HEXABUS".cyan().bold(),
        config.channel.bind
    );

    // Connected devices announce themselves on the discovery stream too
    for addr in devices {
        bus.connect(addr);
    }

    loop {
        tokio::select! {
            discovered = discoveries.recv() => match discovered {
                Ok(DeviceEvent::Discovered(addr)) => {
                    println!("{} {}", "NEW".green().bold(), addr);
                    if let Some(device) = bus.device(&addr) {
                        forward_events(&device, tx.clone());
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} discovery events", skipped),
                Err(RecvError::Closed) => break,
            },
            Some(event) = rx.recv() => print_event(&event),
            _ = shutdown_rx.recv() => break,
        }
    }

    bus.close().await?;
    println!("{}", "Monitor stopped".yellow());
    Ok(())
}

pub async fn run_list(
    config: &CliConfig,
    addr: SocketAddr,
    wait: Option<u64>,
    json: bool,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    let bus = open_bus(config).await?;
    let device = bus.connect(addr);
    let wait = wait.map(Duration::from_secs).unwrap_or_else(|| config.discovery_wait());

    let settled = tokio::select! {
        settled = wait_for_discovery(&device, wait) => settled,
        _ = shutdown_rx.recv() => false,
    };
    let endpoints = device.endpoints();
    bus.close().await?;

    if !settled {
        warn!("Discovery of {} did not finish, listing what was found", addr);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&endpoints)?);
        return Ok(());
    }

    println!(
        "{} {} ({} endpoints)",
        "HEXABUS".cyan().bold(),
        addr,
        endpoints.len()
    );
    for endpoint in &endpoints {
        print_endpoint(endpoint);
    }
    Ok(())
}

pub async fn run_read(
    config: &CliConfig,
    addr: SocketAddr,
    eid: u8,
    timeout: Option<u64>,
) -> Result<()> {
    let bus = open_bus(config).await?;
    let device = bus.connect(addr);
    let timeout = timeout
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_QUERY_TIMEOUT);

    let result = async {
        let endpoint = wait_for_endpoint(&device, eid, config.discovery_wait()).await?;
        let value = device.query_and_wait(eid, timeout).await?;
        Ok::<_, anyhow::Error>((endpoint, value))
    }
    .await;
    bus.close().await?;

    let (endpoint, value) = result?;
    println!(
        "{} {} = {}",
        format!("[{}]", eid).yellow(),
        endpoint.description,
        value.to_string().green().bold()
    );
    Ok(())
}

pub async fn run_write(config: &CliConfig, addr: SocketAddr, eid: u8, text: &str) -> Result<()> {
    let bus = open_bus(config).await?;
    let device = bus.connect(addr);

    let result = async {
        let endpoint = wait_for_endpoint(&device, eid, config.discovery_wait()).await?;
        let data = parse_value(eid, endpoint.kind, text)
            .with_context(|| format!("Invalid value for {}", endpoint))?;
        write_and_confirm(&device, data, DEFAULT_QUERY_TIMEOUT).await
    }
    .await;
    bus.close().await?;

    let data = result?;
    println!("{} {} on {}", "OK".green().bold(), data, addr);
    Ok(())
}

pub async fn run_switch(config: &CliConfig, addr: SocketAddr, on: bool) -> Result<()> {
    let bus = open_bus(config).await?;
    let plug = bus.plug(addr);

    let result = async {
        wait_for_endpoint(plug.device(), SWITCH_EID, config.discovery_wait()).await?;
        write_and_confirm(plug.device(), Data::bool(SWITCH_EID, on), DEFAULT_QUERY_TIMEOUT).await
    }
    .await;
    bus.close().await?;

    result?;
    let state = if on { "on".green().bold() } else { "off".red().bold() };
    println!("{} {} switched {}", "OK".green().bold(), addr, state);
    Ok(())
}

pub fn print_info() {
    println!("{}", "Hexabus - home-automation bus over IPv6".cyan().bold());
    println!();
    println!("Version:    {}", env!("CARGO_PKG_VERSION"));
    println!("Platform:   {}", std::env::consts::OS);
    println!("Arch:       {}", std::env::consts::ARCH);
    println!();
    println!("{}", "Bus:".green());
    println!("  Group:      {}", MULTICAST_GROUP);
    println!("  Port:       {}", DEFAULT_PORT);
    println!("  Max frame:  {} bytes", MAX_PACKET_SIZE);
    println!();
    println!("{}", "Examples:".green());
    println!("  hexabus monitor                              # Watch the bus");
    println!("  hexabus list --device fe80::50:c4ff:fe04:819a%2");
    println!("  hexabus read --device fe80::1%2 --eid 2      # Read the power meter");
    println!("  hexabus switch --device fe80::1%2 on         # Switch a smart plug");
}

/// Copy a device's endpoint events into the monitor's print queue
fn forward_events(device: &Arc<Device>, tx: mpsc::Sender<EndpointEvent>) {
    let mut events = device.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} endpoint events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn wait_for_discovery(device: &Device, wait: Duration) -> bool {
    let deadline = Instant::now() + wait;
    loop {
        if device.is_idle() && !device.endpoints().is_empty() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn wait_for_endpoint(device: &Device, eid: u8, wait: Duration) -> Result<Endpoint> {
    let deadline = Instant::now() + wait;
    loop {
        if let Some(endpoint) = device.endpoint(eid) {
            return Ok(endpoint);
        }
        if Instant::now() >= deadline {
            bail!(
                "Endpoint {} not discovered on {} within {:?}",
                eid,
                device.remote(),
                wait
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Queue a write and wait until the device reports the written value back
async fn write_and_confirm(device: &Device, data: Data, wait: Duration) -> Result<Data> {
    let mut events = device.subscribe();
    if !device.write(data.clone()) {
        bail!("Endpoint {} does not accept {} values", data.eid, data.kind());
    }
    info!("Writing {} to {}", data, device.remote());

    let expected = Packet::write(device.remote(), data.clone());
    let confirmed = tokio::time::timeout(wait, confirm(&mut events, &data, &expected)).await;
    match confirmed {
        Ok(result) => result.map(|()| data),
        Err(_) => bail!("No confirmation for {} within {:?}", data, wait),
    }
}

async fn confirm(
    events: &mut broadcast::Receiver<EndpointEvent>,
    data: &Data,
    expected: &Packet,
) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(EndpointEvent::Updated { endpoint, .. })
                if endpoint.eid == data.eid && endpoint.value.as_ref() == Some(&data.value) =>
            {
                return Ok(());
            }
            Ok(EndpointEvent::Failed {
                request: Some(request),
                code,
                ..
            }) if request == *expected => {
                bail!("Device rejected {}: {}", data, code);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Dropped {} endpoint events", skipped),
            Err(RecvError::Closed) => bail!("Device event stream closed"),
        }
    }
}

fn print_event(event: &EndpointEvent) {
    match event {
        EndpointEvent::Updated { remote, endpoint } => {
            let value = endpoint
                .value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".into());
            println!(
                "{} {} {} = {}",
                remote.to_string().dimmed(),
                format!("[{}]", endpoint.eid).yellow(),
                endpoint.description,
                value.green()
            );
        }
        EndpointEvent::Failed {
            remote,
            request,
            code,
        } => {
            let request = match request.as_ref().map(|r| &r.payload) {
                Some(Payload::Write(data)) => format!("write {}", data),
                Some(payload) => format!("{:?}", payload.kind()),
                None => "unsolicited".to_string(),
            };
            println!(
                "{} {} {} ({})",
                remote.to_string().dimmed(),
                "ERR".red().bold(),
                code,
                request
            );
        }
    }
}

fn print_endpoint(endpoint: &Endpoint) {
    let value = endpoint
        .value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".into());
    println!(
        "  {}  {:<9} {:<12} {}",
        format!("{:>3}", endpoint.eid).yellow(),
        endpoint.kind.name(),
        value,
        endpoint.description
    );
}
