// src/main.rs
use alfred_announce::cli::Args;
use alfred_announce::logging::{self, LogTarget};
use alfred_announce::probe::{self, ProbeContext};
use alfred_announce::{Agent, AgentConfig, AlfredTransport};
use anyhow::Result;
use clap::Parser;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AgentConfig::load_or_default(args.config.as_deref())?;

    let target = if args.daemon {
        LogTarget::File
    } else {
        LogTarget::Stderr
    };
    logging::init(&config.logging, args.log_level.as_deref(), target)?;

    let hostname = sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string());
    tracing::info!(
        "alfred-announced {} started on {} (interface: {}, daemon: {})",
        env!("CARGO_PKG_VERSION"),
        hostname,
        config.interface,
        args.daemon
    );

    let agent = Agent::new(
        probe::catalog()?,
        ProbeContext::from_config(&config),
        &config.statics_file,
        config.probe_timeout(),
        AlfredTransport::new(
            &config.transport.binary,
            Duration::from_secs(config.transport.timeout_secs),
        ),
    );

    tracing::debug!(items = agent.registry().len(), "probe catalog loaded");

    if args.daemon {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        };
        agent.run_resident(config.cycle_interval(), shutdown).await?;
    } else {
        let report = agent.run_once().await?;
        if !report.published() {
            tracing::warn!("not every channel reached alfred");
        }
    }

    Ok(())
}
