// src/cli.rs
//! Command line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Announce daemon for gateways: publishes node info and statistics to alfred.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Stay resident and repeat the announce cycle.
    #[arg(short, long)]
    pub daemon: bool,

    /// Path to configuration file (default: /etc/alfred/announce.json5 if present).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}
