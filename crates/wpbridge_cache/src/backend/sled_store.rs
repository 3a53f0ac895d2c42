use std::borrow::Cow;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::StorageBackend;
use crate::CacheError;

/// Tree holding compiled artifacts. Created on first open.
const COMPILED_TREE: &str = "compiled_cache";

/// Value stored per key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredArtifact<'a> {
    content: Cow<'a, str>,
    /// Seconds since the Unix epoch.
    created_at: u64,
}

/// Durable embedded backend.
#[derive(Clone)]
pub struct SledBackend {
    artifacts: sled::Tree,
}

impl SledBackend {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        debug!("Opening compiled artifact store at {}", path.display());
        Self::with_db(sled::open(path)?)
    }

    /// Opens a store that is deleted when dropped.
    pub fn temporary() -> Result<Self, CacheError> {
        Self::with_db(sled::Config::new().temporary(true).open()?)
    }

    pub fn with_db(db: sled::Db) -> Result<Self, CacheError> {
        Ok(Self {
            artifacts: db.open_tree(COMPILED_TREE)?,
        })
    }
}

impl StorageBackend for SledBackend {
    fn name(&self) -> &'static str {
        "sled"
    }

    fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.artifacts.contains_key(key)?)
    }

    fn fetch(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.artifacts.get(key)? {
            Some(bytes) => {
                let artifact: StoredArtifact<'_> = serde_json::from_slice(&bytes)?;
                Ok(Some(artifact.content.into_owned()))
            }
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, content: &str) -> Result<(), CacheError> {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let artifact = StoredArtifact {
            content: Cow::Borrowed(content),
            created_at,
        };
        self.artifacts.insert(key, serde_json::to_vec(&artifact)?)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.artifacts.remove(key)?.is_some())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.artifacts.len())
    }

    fn flush(&self) -> Result<(), CacheError> {
        self.artifacts.flush()?;
        Ok(())
    }
}
