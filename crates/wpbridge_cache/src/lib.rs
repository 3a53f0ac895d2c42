//! # wpbridge_cache
//!
//! Storage for compiled (transformed) legacy source.
//!
//! Artifacts live in a pluggable key/value [`StorageBackend`] and are
//! materialized to local files so the host runtime can include them by path.
//! Keys are derived from a file's path and modification time, so an edited
//! file gets a new key instead of overwriting its old artifact.

pub mod backend;
mod key;
mod materialize;
mod storage;

pub use backend::{MemoryBackend, SledBackend, StorageBackend};
pub use key::{cache_key, cache_key_for};
pub use materialize::{Invalidator, LocalMaterializer, sanitize_key};
pub use storage::CompiledStorage;

use thiserror::Error;

/// Error type for compiled-artifact storage.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A path was requested for a key that was never compiled.
    #[error("Compiled artifact not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Creates a lookup-miss error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }
}
