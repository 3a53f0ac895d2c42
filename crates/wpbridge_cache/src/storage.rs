//! Backend plus local materialization.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::{CacheError, LocalMaterializer, StorageBackend};

/// Compiled-artifact storage.
///
/// Values go to the backend; every `put` also materializes the value to a
/// local file so its path is immediately valid for inclusion.
#[derive(Clone)]
pub struct CompiledStorage {
    backend: Arc<dyn StorageBackend>,
    materializer: LocalMaterializer,
}

impl CompiledStorage {
    pub fn new(backend: Arc<dyn StorageBackend>, materializer: LocalMaterializer) -> Self {
        Self {
            backend,
            materializer,
        }
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub fn materializer(&self) -> &LocalMaterializer {
        &self.materializer
    }

    pub fn has(&self, key: &str) -> Result<bool, CacheError> {
        self.backend.contains(key)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.backend.fetch(key)
    }

    /// Stores `content` under `key` and materializes it.
    pub fn put(&self, key: &str, content: &str) -> Result<(), CacheError> {
        self.backend.store(key, content)?;
        self.materializer.write(key, content)?;
        Ok(())
    }

    /// Local path whose contents equal `get(key)`.
    ///
    /// A missing local file is rewritten from the backend. A key the backend
    /// does not have is a [`CacheError::NotFound`].
    pub fn get_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        let path = self.materializer.path_for(key);
        if path.is_file() {
            return Ok(path);
        }

        match self.backend.fetch(key)? {
            Some(content) => {
                debug!("Re-materializing {} from {} backend", key, self.backend.name());
                self.materializer.write(key, &content)
            }
            None => Err(CacheError::not_found(key)),
        }
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        self.backend.flush()
    }
}

impl std::fmt::Debug for CompiledStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledStorage")
            .field("backend", &self.backend.name())
            .field("materializer", &self.materializer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBackend, SledBackend};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn storage(dir: &std::path::Path) -> CompiledStorage {
        CompiledStorage::new(
            Arc::new(MemoryBackend::new()),
            LocalMaterializer::new(dir.join("compiled")),
        )
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        let content = "<?php\n$x = app('global')->get('x');\n";

        assert!(!storage.has("k").unwrap());
        storage.put("k", content).unwrap();

        assert!(storage.has("k").unwrap());
        assert_eq!(storage.get("k").unwrap().as_deref(), Some(content));
        let path = storage.get_path("k").unwrap();
        assert_eq!(fs::read(path).unwrap(), content.as_bytes());
    }

    #[test]
    fn test_get_path_rematerializes() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path());
        storage.put("k", "body").unwrap();

        fs::remove_file(storage.materializer().path_for("k")).unwrap();
        let path = storage.get_path("k").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "body");
    }

    #[test]
    fn test_get_path_for_unknown_key_fails() {
        let dir = tempdir().unwrap();
        let err = storage(dir.path()).get_path("never").unwrap_err();
        assert!(matches!(err, CacheError::NotFound(key) if key == "never"));
    }

    #[test]
    fn test_concurrent_writers_same_key() {
        let dir = tempdir().unwrap();
        let storage = CompiledStorage::new(
            Arc::new(SledBackend::temporary().unwrap()),
            LocalMaterializer::new(dir.path()),
        );
        let content = "x".repeat(64 * 1024);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| storage.put("shared", &content).unwrap());
            }
        });

        assert_eq!(storage.get("shared").unwrap().as_deref(), Some(content.as_str()));
        let path = storage.get_path("shared").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), content);
    }
}
