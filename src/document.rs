// src/document.rs
//! Document tree built from flat item results and merged with site overrides.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::item::RESERVED_PREFIX;

/// Tree construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// A path is used both as a leaf and as a branch.
    #[error("'{path}' is both a value and a parent of other items")]
    Collision { path: String },
    /// Nothing is left of a name after stripping the reserved prefix.
    #[error("'{0}' does not address any node")]
    EmptyPath(String),
}

/// A node of the document tree.
///
/// Probes may produce mappings of their own (e.g. traffic counters); those
/// stay a single `Leaf` until a merge needs to descend into them.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Value),
    Branch(BTreeMap<String, Node>),
}

impl Default for Node {
    fn default() -> Self {
        Node::Branch(BTreeMap::new())
    }
}

impl From<Value> for Node {
    /// JSON objects become branches, everything else a leaf.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                Node::Branch(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
            other => Node::Leaf(other),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        node.into_value()
    }
}

impl Node {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_value(self) -> Value {
        match self {
            Node::Leaf(value) => value,
            Node::Branch(children) => Value::Object(
                children
                    .into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    /// Child of a branch.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Branch(children) => children.get(key),
            Node::Leaf(_) => None,
        }
    }

    /// Whether the merge treats this node as a mapping.
    fn is_mapping(&self) -> bool {
        matches!(self, Node::Branch(_) | Node::Leaf(Value::Object(_)))
    }

    /// Children of a mapping node, turning a probe-produced object into a
    /// branch first.
    fn mapping_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        if let Node::Leaf(Value::Object(map)) = self {
            let map = std::mem::take(map);
            *self = Node::from(Value::Object(map));
        }
        match self {
            Node::Branch(children) => Some(children),
            Node::Leaf(_) => None,
        }
    }

    /// Fold `overrides` into `self`.
    ///
    /// For every key of `overrides`: if both sides are mappings, recurse;
    /// otherwise the override value replaces whatever was there, a whole
    /// subtree included. Keys only present in `self` are left alone.
    pub fn merge(&mut self, mut overrides: Node) {
        if !(self.is_mapping() && overrides.is_mapping()) {
            *self = overrides;
            return;
        }

        let (Some(base), Some(incoming)) = (self.mapping_mut(), overrides.mapping_mut()) else {
            return;
        };

        for (key, value) in std::mem::take(incoming) {
            match base.get_mut(&key) {
                Some(existing) if existing.is_mapping() && value.is_mapping() => {
                    existing.merge(value)
                }
                _ => {
                    base.insert(key, value);
                }
            }
        }
    }

    /// Dotted paths of all leaves, in key order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_leaf_paths(String::new(), &mut paths);
        paths
    }

    fn collect_leaf_paths(&self, prefix: String, out: &mut Vec<String>) {
        match self {
            Node::Leaf(_) => out.push(prefix),
            Node::Branch(children) => {
                for (key, child) in children {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    child.collect_leaf_paths(path, out);
                }
            }
        }
    }
}

/// Nest a flat `dotted.name -> value` mapping into a document tree.
///
/// A leading `json` segment is dropped. A name that would place a value
/// where another name already needs a branch (or the reverse) is an error.
pub fn expand<'a, I>(flat: I) -> Result<Node, DocumentError>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut root = BTreeMap::new();

    for (name, value) in flat {
        let mut segments: Vec<&str> = name.split('.').collect();
        if segments.first() == Some(&RESERVED_PREFIX) {
            segments.remove(0);
        }
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(DocumentError::EmptyPath(name.clone()));
        };

        let mut target = &mut root;
        for (depth, segment) in parents.iter().enumerate() {
            let child = target
                .entry(segment.to_string())
                .or_insert_with(Node::empty);
            target = match child {
                Node::Branch(children) => children,
                Node::Leaf(_) => {
                    return Err(DocumentError::Collision {
                        path: segments[..=depth].join("."),
                    });
                }
            };
        }

        if target.contains_key(*leaf) {
            return Err(DocumentError::Collision {
                path: segments.join("."),
            });
        }
        target.insert(leaf.to_string(), Node::Leaf(value.clone()));
    }

    Ok(Node::Branch(root))
}
