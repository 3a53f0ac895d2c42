//! Bridge error types.

use thiserror::Error;

use crate::ExecutorError;

/// Errors that can occur while compiling or loading legacy code.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A transformer could not be built or failed while rewriting.
    #[error("Transformer error: {0}")]
    Transform(#[from] wpbridge_transform::TransformError),

    /// Compiled-artifact storage error.
    #[error("Cache error: {0}")]
    Cache(#[from] wpbridge_cache::CacheError),

    /// Declaration or manifest error.
    #[error("Manifest error: {0}")]
    Manifest(#[from] wpbridge_manifest::ManifestError),

    /// The host runtime failed to execute legacy code.
    #[error("Execution error: {0}")]
    Executor(#[from] ExecutorError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
