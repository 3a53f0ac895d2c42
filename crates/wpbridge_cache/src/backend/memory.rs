use std::collections::HashMap;

use parking_lot::RwLock;

use super::StorageBackend;
use crate::CacheError;

/// Process-local backend. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.read().contains_key(key))
    }

    fn fetch(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn store(&self, key: &str, content: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .insert(key.to_string(), content.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.entries.read().len())
    }
}
