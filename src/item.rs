// src/item.rs
//! Item registry: the catalog of named measurements.
//!
//! An item is a dotted name such as `statistics.loadavg`, a probe producing
//! its value and a nominal refresh interval. Every item is probed on every
//! cycle; the interval is carried as metadata only.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::probe::ProbeFn;

/// Leading segment stripped by the path expander, so an item may be filed
/// under a literal `json` segment without moving its output location.
pub const RESERVED_PREFIX: &str = "json";

/// Registry errors. All of them are configuration errors found at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("Invalid item name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("Item '{0}' is registered twice")]
    Duplicate(String),
}

/// Validated dotted item name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemName(String);

impl ItemName {
    /// Parse a dotted name. Each segment must be a lowercase identifier
    /// (`[a-z_][a-z0-9_]*`), usable as a key in the published JSON.
    pub fn parse(name: &str) -> Result<Self, ItemError> {
        let invalid = |reason| ItemError::InvalidName {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("empty name"));
        }

        for segment in name.split('.') {
            let mut chars = segment.chars();
            match chars.next() {
                None => return Err(invalid("empty segment")),
                Some(c) if c.is_ascii_lowercase() || c == '_' => {}
                Some(_) => return Err(invalid("segment must start with a-z or '_'")),
            }
            if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
                return Err(invalid("segment may only contain a-z, 0-9 and '_'"));
            }
        }

        if name == RESERVED_PREFIX {
            return Err(invalid("reserved prefix needs at least one more segment"));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registered measurement.
#[derive(Clone)]
pub struct Item {
    pub name: ItemName,
    /// Declared refresh interval. Not used to skip work.
    pub interval: Duration,
    pub probe: ProbeFn,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Immutable-after-startup item catalog. Iterates in registration order.
#[derive(Debug, Default, Clone)]
pub struct ItemRegistry {
    items: Vec<Item>,
    names: HashSet<ItemName>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item. Names must be unique across the registry.
    pub fn register(
        &mut self,
        name: &str,
        interval: Duration,
        probe: ProbeFn,
    ) -> Result<&mut Self, ItemError> {
        let name = ItemName::parse(name)?;
        if !self.names.insert(name.clone()) {
            return Err(ItemError::Duplicate(name.0));
        }
        self.items.push(Item {
            name,
            interval,
            probe,
        });
        Ok(self)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeContext, ProbeFuture};
    use serde_json::json;

    fn constant(_ctx: &ProbeContext) -> ProbeFuture<'_> {
        Box::pin(async { Ok(json!(1)) })
    }

    #[test]
    fn test_valid_names() {
        for name in [
            "node.hostname",
            "node.software.batman_adv.version",
            "statistics.loadavg",
            "_private.x1",
            "json.node.hostname",
        ] {
            assert!(ItemName::parse(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "",
            "node.",
            ".node",
            "node..hostname",
            "Node.hostname",
            "node.1st",
            "node.host-name",
            "json",
        ] {
            assert!(
                matches!(ItemName::parse(name), Err(ItemError::InvalidName { .. })),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ItemRegistry::new();
        registry
            .register("node.hostname", Duration::from_secs(3600), constant)
            .unwrap();
        let err = registry
            .register("node.hostname", Duration::from_secs(60), constant)
            .unwrap_err();
        assert_eq!(err, ItemError::Duplicate("node.hostname".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registration_order_is_stable() {
        let mut registry = ItemRegistry::new();
        registry
            .register("statistics.uptime", Duration::from_secs(60), constant)
            .unwrap()
            .register("node.hostname", Duration::from_secs(3600), constant)
            .unwrap()
            .register("node.vpn", Duration::from_secs(3600), constant)
            .unwrap();

        let names: Vec<&str> = registry.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["statistics.uptime", "node.hostname", "node.vpn"]);
        let intervals: Vec<u64> = registry.items().iter().map(|i| i.interval.as_secs()).collect();
        assert_eq!(intervals, [60, 3600, 3600]);
    }
}
