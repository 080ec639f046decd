// src/agent.rs
//! One announce cycle: collect, expand, merge overrides, publish.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::collector::{self, ProbeFailure};
use crate::dispatch::{self, ChannelOutcome, Transport};
use crate::document::{self, Node};
use crate::error::Result;
use crate::item::ItemRegistry;
use crate::overrides::load_overrides;
use crate::probe::ProbeContext;

/// What happened during one cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// The document that was split into channels.
    pub merged: Node,
    pub failures: Vec<ProbeFailure>,
    pub outcomes: Vec<ChannelOutcome>,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Whether every channel reached the transport.
    pub fn published(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// The announce pipeline with its injected collaborators.
pub struct Agent<T> {
    registry: ItemRegistry,
    ctx: ProbeContext,
    statics_file: PathBuf,
    probe_timeout: Duration,
    transport: T,
}

impl<T: Transport> Agent<T> {
    pub fn new(
        registry: ItemRegistry,
        ctx: ProbeContext,
        statics_file: impl Into<PathBuf>,
        probe_timeout: Duration,
        transport: T,
    ) -> Self {
        Self {
            registry,
            ctx,
            statics_file: statics_file.into(),
            probe_timeout,
            transport,
        }
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the pipeline once.
    ///
    /// Only a structural collision between item names or an encoding failure
    /// is returned as an error; probe, override and transport failures end
    /// up in the report.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let started = Instant::now();

        let collection = collector::collect(&self.registry, &self.ctx, self.probe_timeout).await;
        let mut merged = document::expand(&collection.values)?;
        merged.merge(load_overrides(&self.statics_file));

        let payloads = dispatch::prepare(&merged)?;
        let outcomes = dispatch::publish(&self.transport, &payloads).await;

        let report = CycleReport {
            merged,
            failures: collection.failures,
            outcomes,
            elapsed: started.elapsed(),
        };

        info!(
            items = self.registry.len(),
            failed = report.failures.len(),
            published = report.published(),
            "cycle finished in {:.2}s",
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }

    /// Repeat [`run_once`](Self::run_once) every `interval` until `shutdown`
    /// resolves. Each cycle starts from scratch.
    pub async fn run_resident<S>(&self, interval: Duration, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            match self.run_once().await {
                Ok(report) if !report.published() => {
                    warn!("cycle finished with unpublished channels")
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "cycle aborted");
                    return Err(e);
                }
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
