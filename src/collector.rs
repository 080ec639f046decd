// src/collector.rs
//! Runs every registered probe once and gathers the flat result mapping.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::item::{ItemName, ItemRegistry};
use crate::probe::{ProbeContext, ProbeError, UNAVAILABLE};

/// A probe that produced no value this cycle.
#[derive(Debug)]
pub struct ProbeFailure {
    pub item: ItemName,
    pub error: ProbeError,
}

/// Outcome of one collection pass.
#[derive(Debug, Default)]
pub struct Collection {
    /// Dotted item name to value; failed items hold [`UNAVAILABLE`].
    pub values: BTreeMap<String, Value>,
    pub failures: Vec<ProbeFailure>,
}

/// Probe every item in registration order.
///
/// Each probe is bounded by `timeout`. A failing or hung probe is recorded
/// and replaced by the unavailable marker; it never stops the others.
pub async fn collect(registry: &ItemRegistry, ctx: &ProbeContext, timeout: Duration) -> Collection {
    let mut collection = Collection::default();

    for item in registry.items() {
        let result = match tokio::time::timeout(timeout, (item.probe)(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        let value = match result {
            Ok(value) => {
                debug!(item = %item.name, %value, "probed");
                value
            }
            Err(error) => {
                warn!(item = %item.name, %error, "probe failed");
                collection.failures.push(ProbeFailure {
                    item: item.name.clone(),
                    error,
                });
                Value::String(UNAVAILABLE.to_string())
            }
        };

        collection.values.insert(item.name.to_string(), value);
    }

    collection
}
