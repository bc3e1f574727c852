//! Argument parsing helpers

use anyhow::{anyhow, bail, Context, Result};
use hexabus_core::{Data, DataKind, DateTime, Value, DEFAULT_PORT};
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

/// Parse a device address: a full socket address (`[fe80::1%2]:61616`) or a
/// bare IPv6 address with an optional numeric scope (`fe80::1%2`), which gets
/// the Hexabus port.
pub fn parse_device(text: &str) -> Result<SocketAddr> {
    if let Ok(addr) = text.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let (ip, scope) = match text.split_once('%') {
        Some((ip, scope)) => (
            ip,
            scope
                .parse::<u32>()
                .with_context(|| format!("Scope id must be an interface index: {}", scope))?,
        ),
        None => (text, 0),
    };
    let ip: Ipv6Addr = ip
        .parse()
        .with_context(|| format!("Not a device address: {}", text))?;

    Ok(SocketAddr::V6(SocketAddrV6::new(ip, DEFAULT_PORT, 0, scope)))
}

/// Parse a command-line value for an endpoint declared as `kind`
pub fn parse_value(eid: u8, kind: DataKind, text: &str) -> Result<Data> {
    let value = match kind {
        DataKind::Bool => Value::Bool(parse_bool(text)?),
        DataKind::UInt8 => Value::UInt8(text.parse().context("Expected 0-255")?),
        DataKind::UInt32 => Value::UInt32(text.parse().context("Expected an unsigned integer")?),
        DataKind::Float => Value::Float(text.parse().context("Expected a number")?),
        DataKind::Timestamp => Value::Timestamp(text.parse().context("Expected an integer")?),
        DataKind::DateTime => {
            let dt: DateTime = serde_json::from_str(text).context(
                "Expected a JSON object with hour, minute, second, day, month, year, weekday",
            )?;
            Value::DateTime(dt)
        }
        DataKind::Text => return Ok(Data::text(eid, text)?),
        DataKind::Unknown => bail!("Endpoint {} has no writable value", eid),
    };
    Ok(Data::new(eid, value))
}

pub fn parse_bool(text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        _ => Err(anyhow!("Expected on/off, got {}", text)),
    }
}
