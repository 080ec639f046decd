//! Announce agent for mesh gateways.
//!
//! Collects a fixed catalog of items (node identity, VPN and software
//! versions, load, memory, traffic, peer and lease counts), nests them by
//! their dotted names, merges the site's static overrides and publishes the
//! `node` and `statistics` subtrees to the local alfred server.

pub mod agent;
pub mod cli;
pub mod collector;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod item;
pub mod logging;
pub mod overrides;
pub mod probe;

pub use agent::{Agent, CycleReport};
pub use config::AgentConfig;
pub use dispatch::{AlfredTransport, Channel, Transport};
pub use document::{Node, expand};
pub use error::{AgentError, Result};
pub use item::{ItemName, ItemRegistry};
