// src/probe/net.rs
//! Mesh interface items: MAC addresses, batman-adv version, traffic counters.

use serde_json::{Map, Value, json};

use super::{ProbeContext, ProbeError, ProbeFuture, parse_mac, read_line, run_command};

/// Counter groups reported by `ethtool -S` on a batman-adv interface.
const TRAFFIC_GROUPS: [&str; 5] = ["tx", "rx", "forward", "mgmt_tx", "mgmt_rx"];

/// MAC address of the mesh interface.
pub fn mac(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let address = read_line(&ctx.mac_file(&ctx.interface)).await?;
        parse_mac(&address).map(Value::String)
    })
}

/// MAC addresses of the interfaces enslaved to the mesh interface.
pub fn mesh_interfaces(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let lines = run_command("batctl", &["-m", ctx.interface.as_str(), "if"]).await?;
        let mut macs = Vec::new();
        for iface in parse_batctl_interfaces(&lines) {
            let address = read_line(&ctx.mac_file(iface)).await?;
            macs.push(Value::String(parse_mac(&address)?));
        }
        Ok(Value::Array(macs))
    })
}

pub fn batman_version(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        read_line(&ctx.paths.batman_version)
            .await
            .map(Value::String)
    })
}

/// Packet, byte and drop counters of the mesh interface.
pub fn traffic(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let lines = run_command("ethtool", &["-S", ctx.interface.as_str()]).await?;
        parse_ethtool_stats(&lines)
    })
}

/// Interface names from `batctl if` output (`enp0s3: active`).
pub fn parse_batctl_interfaces(lines: &[String]) -> Vec<&str> {
    lines
        .iter()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, _)| name.trim())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Group `ethtool -S` counters into `{group: {bytes, packets, dropped}}`.
///
/// The first line is a header. Counters without a `_bytes` or `_dropped`
/// suffix count packets.
pub fn parse_ethtool_stats(lines: &[String]) -> Result<Value, ProbeError> {
    let mut traffic: Map<String, Value> = TRAFFIC_GROUPS
        .iter()
        .map(|group| (group.to_string(), Value::Object(Map::new())))
        .collect();

    for line in lines.iter().skip(1) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let prefix = key.split('_').next().unwrap_or_default();
        if !matches!(prefix, "tx" | "rx" | "mgmt" | "forward") {
            continue;
        }

        let value: u64 = value
            .trim()
            .parse()
            .map_err(|e| ProbeError::parse(format!("ethtool counter {key}: {e}")))?;

        let key = if key.ends_with("_bytes") || key.ends_with("_dropped") {
            key.to_string()
        } else {
            format!("{key}_packets")
        };
        let Some((group, counter)) = key.rsplit_once('_') else {
            continue;
        };

        if let Value::Object(counters) = traffic
            .entry(group.to_string())
            .or_insert_with(|| json!({}))
        {
            counters.insert(counter.to_string(), json!(value));
        }
    }

    Ok(Value::Object(traffic))
}
