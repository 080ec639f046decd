// src/overrides.rs
//! Site specific static data (`statics.json`).
//!
//! The file has the same shape as the published document, for example
//! `{"node": {"hostname": "Gateway Pinneberg", "location": {...}}}`, and wins
//! over collected values. It is optional: a missing or broken file means no
//! overrides for this cycle.

use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

use crate::document::Node;

/// Load the override document, falling back to an empty tree.
pub fn load_overrides(path: &Path) -> Node {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no statics file");
            return Node::empty();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read statics file");
            return Node::empty();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(value @ Value::Object(_)) => Node::from(value),
        Ok(_) => {
            warn!(path = %path.display(), "statics file is not a JSON object, ignored");
            Node::empty()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "syntax error in statics file, ignored");
            Node::empty()
        }
    }
}
