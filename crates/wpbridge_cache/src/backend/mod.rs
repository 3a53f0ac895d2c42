//! Key/value backends for compiled artifacts.
//!
//! Backends must tolerate concurrent writers for the same key. Content for a
//! key is deterministic, so last-writer-wins is acceptable.

mod memory;
mod sled_store;

pub use memory::MemoryBackend;
pub use sled_store::SledBackend;

use crate::CacheError;

/// A durable or in-process store of compiled source keyed by cache key.
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn contains(&self, key: &str) -> Result<bool, CacheError>;

    fn fetch(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `content` under `key`, replacing any previous value.
    fn store(&self, key: &str, content: &str) -> Result<(), CacheError>;

    /// Removes `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Number of stored artifacts.
    fn len(&self) -> Result<usize, CacheError>;

    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// Makes previous writes durable.
    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
