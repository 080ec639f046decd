// src/config.rs
//! Agent configuration.
//!
//! Every probe reads its inputs from here instead of hard-coded paths, so the
//! whole catalog can be pointed at a different interface or fixture files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Location checked when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/alfred/announce.json5";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// batman-adv mesh interface (default: "bat0").
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Site specific override document merged into every cycle.
    #[serde(default = "default_statics_file")]
    pub statics_file: PathBuf,

    /// Cycle period when running resident (default: 60).
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Upper bound for a single probe (default: 10).
    #[serde(default = "default_timeout")]
    pub probe_timeout_secs: u64,

    /// Probe input locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// alfred invocation.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_interface() -> String {
    "bat0".to_string()
}

fn default_statics_file() -> PathBuf {
    PathBuf::from("/etc/alfred/statics.json")
}

fn default_cycle_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            statics_file: default_statics_file(),
            cycle_interval_secs: default_cycle_interval(),
            probe_timeout_secs: default_timeout(),
            paths: PathsConfig::default(),
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Files, directories and sockets read by the probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub proc_root: PathBuf,
    pub sys_class_net: PathBuf,
    pub batman_version: PathBuf,
    /// Directory holding `<interface>/gateways`.
    pub batman_debug: PathBuf,
    pub openvpn_default: PathBuf,
    pub openvpn_dir: PathBuf,
    pub fastd_config: PathBuf,
    pub fastd_socket: PathBuf,
    pub dhcp_leases: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_class_net: PathBuf::from("/sys/class/net"),
            batman_version: PathBuf::from("/sys/module/batman_adv/version"),
            batman_debug: PathBuf::from("/sys/kernel/debug/batman_adv"),
            openvpn_default: PathBuf::from("/etc/default/openvpn"),
            openvpn_dir: PathBuf::from("/etc/openvpn"),
            fastd_config: PathBuf::from("/etc/fastd/ffpi/fastd.conf"),
            fastd_socket: PathBuf::from("/var/run/fastd/ffpi.sock"),
            dhcp_leases: PathBuf::from("/var/lib/dhcp/dhcpd.leases"),
        }
    }
}

/// How payloads reach the local alfred server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// alfred client binary (default: "alfred").
    #[serde(default = "default_alfred_binary")]
    pub binary: String,

    /// Upper bound for one alfred invocation (default: 10).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_alfred_binary() -> String {
    "alfred".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            binary: default_alfred_binary(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file used when running resident.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/alfred-announced.log")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a JSON5 file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Load an explicitly requested file, or fall back to the well-known
    /// location, or to built-in defaults when that is absent too.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.trim().is_empty() {
            return Err(ConfigError::Validation("interface must not be empty".into()));
        }
        if self.transport.binary.trim().is_empty() {
            return Err(ConfigError::Validation(
                "transport.binary must not be empty".into(),
            ));
        }
        if self.probe_timeout_secs == 0 || self.transport.timeout_secs == 0 {
            return Err(ConfigError::Validation("timeouts must be non-zero".into()));
        }
        if self.cycle_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "cycle_interval_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    /// batman-adv gateway table of the configured interface.
    pub fn gateways_file(&self) -> PathBuf {
        self.paths.batman_debug.join(&self.interface).join("gateways")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_gateway_layout() {
        let config = AgentConfig::default();
        assert_eq!(config.interface, "bat0");
        assert_eq!(config.statics_file, PathBuf::from("/etc/alfred/statics.json"));
        assert_eq!(config.transport.binary, "alfred");
        assert_eq!(
            config.gateways_file(),
            PathBuf::from("/sys/kernel/debug/batman_adv/bat0/gateways")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json5_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                // mesh on a second interface
                interface: "bat1",
                paths: {{ fastd_socket: "/run/fastd.sock" }},
            }}"#
        )
        .unwrap();

        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.interface, "bat1");
        assert_eq!(config.paths.fastd_socket, PathBuf::from("/run/fastd.sock"));
        assert_eq!(config.paths.proc_root, PathBuf::from("/proc"));
        assert_eq!(config.cycle_interval_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_not_found() {
        let result = AgentConfig::load("/nonexistent/announce.json5");
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));

        let result = AgentConfig::load_or_default(Some(Path::new("/nonexistent/announce.json5")));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_config_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ interface: ").unwrap();
        assert!(matches!(
            AgentConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ probe_timeout_secs: 0 }}").unwrap();
        assert!(matches!(
            AgentConfig::load(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_empty_interface() {
        let config = AgentConfig {
            interface: " ".to_string(),
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
