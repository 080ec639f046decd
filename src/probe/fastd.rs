// src/probe/fastd.rs
//! fastd items: version, bind port and connected peers.

use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tracing::debug;

use super::{ProbeContext, ProbeError, ProbeFuture, first_line, parse_mac, read_file};

/// Status document served on the fastd status socket.
#[derive(Debug, Deserialize)]
pub struct FastdStatus {
    #[serde(default)]
    pub peers: HashMap<String, FastdPeer>,
}

#[derive(Debug, Deserialize)]
pub struct FastdPeer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub connection: Option<FastdConnection>,
}

#[derive(Debug, Deserialize)]
pub struct FastdConnection {
    #[serde(default)]
    pub mac_addresses: Vec<String>,
}

/// fastd version string, e.g. `v18`.
pub fn version(_ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async {
        let line = first_line("fastd", &["-v"]).await?;
        line.split_whitespace()
            .nth(1)
            .map(|v| Value::String(v.to_string()))
            .ok_or_else(|| ProbeError::parse(format!("fastd -v: '{line}'")))
    })
}

/// Port of the first `bind` statement in fastd.conf.
pub fn port(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let text = read_file(&ctx.paths.fastd_config).await?;
        parse_bind_port(&text).map(Value::String)
    })
}

/// Connected peers that are not gateways themselves.
pub fn peers(ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async move {
        let status = query_status(ctx).await?;
        let gateways = parse_gateway_macs(&read_file(&ctx.gateways_file).await?)?;
        Ok(json!(count_peers(&status, &gateways)))
    })
}

async fn query_status(ctx: &ProbeContext) -> Result<FastdStatus, ProbeError> {
    let socket = &ctx.paths.fastd_socket;
    let mut stream = UnixStream::connect(socket).await.map_err(|e| {
        ProbeError::Unavailable(format!("fastd socket {}: {e}", socket.display()))
    })?;

    let mut buf = String::new();
    stream
        .read_to_string(&mut buf)
        .await
        .map_err(|source| ProbeError::Io {
            path: socket.clone(),
            source,
        })?;

    serde_json::from_str(&buf).map_err(|e| ProbeError::parse(format!("fastd status: {e}")))
}

/// Port from the first `bind <address>:<port>;` line.
pub fn parse_bind_port(text: &str) -> Result<String, ProbeError> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("bind "))
        .ok_or_else(|| ProbeError::missing("bind statement in fastd.conf"))?;

    let address = line
        .split_whitespace()
        .nth(1)
        .map(|a| a.trim_end_matches(';'))
        .ok_or_else(|| ProbeError::parse(format!("fastd.conf: '{line}'")))?;
    let (_, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ProbeError::parse(format!("fastd.conf: no port in '{address}'")))?;
    port.parse::<u16>()
        .map_err(|e| ProbeError::parse(format!("fastd.conf: port '{port}': {e}")))?;

    Ok(port.to_string())
}

/// Originator MACs of the batman-adv gateway table.
///
/// Entries start with the gateway MAC, optionally preceded by the `=>`
/// marker of the selected gateway. Banner, column header and the
/// `No gateways in range` notice are skipped.
pub fn parse_gateway_macs(text: &str) -> Result<HashSet<String>, ProbeError> {
    text.lines()
        .map(|line| line.trim_start().trim_start_matches("=>"))
        .filter_map(|line| line.split_whitespace().next())
        .filter(|token| is_entry_start(token))
        .map(parse_mac)
        .collect()
}

/// Colon separated hex digits, i.e. a gateway entry even if truncated.
fn is_entry_start(token: &str) -> bool {
    token.contains(':') && token.chars().all(|c| c == ':' || c.is_ascii_hexdigit())
}

/// Peers with a live connection whose MACs are not in `gateways`.
pub fn count_peers(status: &FastdStatus, gateways: &HashSet<String>) -> usize {
    status
        .peers
        .values()
        .filter_map(|peer| peer.connection.as_ref().map(|conn| (peer, conn)))
        .filter(|(peer, conn)| {
            let gateway = conn
                .mac_addresses
                .iter()
                .any(|mac| gateways.contains(&mac.to_ascii_lowercase()));
            if gateway {
                let name = peer.name.as_deref().unwrap_or("unnamed");
                debug!(peer = name, "skipping gateway peer");
            }
            !gateway
        })
        .count()
}
