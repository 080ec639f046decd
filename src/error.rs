// src/error.rs
//! Error types shared across the announce pipeline.

use thiserror::Error;

use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::document::DocumentError;
use crate::item::ItemError;

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that stop an announce cycle.
///
/// Probe, override and transport failures are not in here: they are logged
/// and the cycle carries on without them.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Invalid agent configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid or duplicate item registration.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// Two items address the same document node as leaf and branch.
    #[error("Structural collision in item tree: {0}")]
    Document(#[from] DocumentError),

    /// Channel payload could not be encoded.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
