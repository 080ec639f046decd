// src/probe/mod.rs
//! Probes: one async function per item, each producing a JSON value.

pub mod dhcp;
pub mod fastd;
pub mod net;
pub mod sys;
pub mod vpn;

use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::config::{AgentConfig, PathsConfig};
use crate::item::{ItemError, ItemRegistry};

/// Value recorded for an item whose probe failed.
pub const UNAVAILABLE: &str = "n/a";

/// Why a probe produced no value.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },
    #[error("Unexpected format: {0}")]
    Parse(String),
    #[error("Value not found: {0}")]
    Missing(String),
    #[error("Source unavailable: {0}")]
    Unavailable(String),
    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),
}

impl ProbeError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::Missing(msg.into())
    }
}

pub type ProbeResult = Result<Value, ProbeError>;

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>>;

/// Signature shared by every probe.
pub type ProbeFn = for<'a> fn(&'a ProbeContext) -> ProbeFuture<'a>;

/// Read-only settings handed to each probe.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub interface: String,
    pub paths: PathsConfig,
    pub gateways_file: PathBuf,
}

impl ProbeContext {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            interface: config.interface.clone(),
            paths: config.paths.clone(),
            gateways_file: config.gateways_file(),
        }
    }

    /// Path below the configured `/proc`.
    pub fn proc_file(&self, name: &str) -> PathBuf {
        self.paths.proc_root.join(name)
    }

    /// `address` file of a network interface.
    pub fn mac_file(&self, interface: &str) -> PathBuf {
        self.paths.sys_class_net.join(interface).join("address")
    }
}

/// Read a whole file.
pub async fn read_file(path: &Path) -> Result<String, ProbeError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProbeError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Read a single-line pseudo file, trimmed.
pub async fn read_line(path: &Path) -> Result<String, ProbeError> {
    Ok(read_file(path).await?.trim().to_string())
}

/// Run a command and return its stdout lines. A non-zero exit is an error.
pub async fn run_command(program: &str, args: &[&str]) -> Result<Vec<String>, ProbeError> {
    let command = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ProbeError::Command {
            command: command.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ProbeError::Command {
            command,
            message: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

/// First stdout line of a command.
pub async fn first_line(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    run_command(program, args)
        .await?
        .into_iter()
        .next()
        .map(|line| line.trim().to_string())
        .ok_or_else(|| ProbeError::missing(format!("no output from {program}")))
}

/// Accept `aa:bb:cc:dd:ee:ff` (case-insensitive) and return it lowercased.
pub fn parse_mac(text: &str) -> Result<String, ProbeError> {
    let octets: Vec<&str> = text.split(':').collect();
    let valid = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(text.to_ascii_lowercase())
    } else {
        Err(ProbeError::parse(format!("'{text}' is not a MAC address")))
    }
}

fn constant_true(_ctx: &ProbeContext) -> ProbeFuture<'_> {
    Box::pin(async { Ok(Value::Bool(true)) })
}

/// The gateway item catalog.
pub fn catalog() -> Result<ItemRegistry, ItemError> {
    const HOUR: Duration = Duration::from_secs(3600);
    const MINUTE: Duration = Duration::from_secs(60);

    let mut registry = ItemRegistry::new();
    registry
        .register("node.hostname", HOUR, sys::hostname)?
        .register("node.vpn", HOUR, constant_true)?
        .register("node.network.mac", HOUR, net::mac)?
        .register("node.network.mesh_interfaces", HOUR, net::mesh_interfaces)?
        .register("node.network.exitvpn.provider", HOUR, vpn::exitvpn_provider)?
        .register("node.network.exitvpn.country", HOUR, vpn::exitvpn_country)?
        .register("node.software.batman_adv.version", HOUR, net::batman_version)?
        .register("node.software.fastd.version", HOUR, fastd::version)?
        .register("node.software.fastd.enabled", MINUTE, constant_true)?
        .register("node.software.fastd.port", Duration::from_secs(36000), fastd::port)?
        .register("node.software.firmware.base", HOUR, sys::firmware_base)?
        .register("node.software.firmware.release", HOUR, sys::firmware_release)?
        .register("node.hardware.model", HOUR, sys::hardware_model)?
        .register("node.hardware.nproc", HOUR, sys::nproc)?
        .register("statistics.idletime", MINUTE, sys::idletime)?
        .register("statistics.loadavg", MINUTE, sys::loadavg)?
        .register("statistics.memory", MINUTE, sys::memory)?
        .register("statistics.processes", MINUTE, sys::processes)?
        .register("statistics.traffic", MINUTE, net::traffic)?
        .register("statistics.uptime", MINUTE, sys::uptime)?
        .register("statistics.peers", MINUTE, fastd::peers)?
        .register("statistics.dhcp_leases", MINUTE, dhcp::active_leases)?;
    Ok(registry)
}
