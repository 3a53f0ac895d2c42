//! Local files for compiled artifacts.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::CacheError;

/// Memory-backed filesystem preferred for materialized artifacts.
const SHM_ROOT: &str = "/dev/shm";

const DIR_NAME: &str = "wpbridge_compiled";

/// Called with the path of every freshly written artifact, so a bytecode
/// cache in the host runtime can drop its stale entry.
pub type Invalidator = Arc<dyn Fn(&Path) + Send + Sync>;

/// Writes artifacts to `<dir>/<sanitized key>.php`.
#[derive(Clone)]
pub struct LocalMaterializer {
    dir: PathBuf,
    invalidator: Option<Invalidator>,
}

impl LocalMaterializer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            invalidator: None,
        }
    }

    /// `/dev/shm/wpbridge_compiled` when a memory-backed filesystem exists,
    /// otherwise a directory under the system temp dir.
    pub fn default_dir() -> PathBuf {
        let shm = Path::new(SHM_ROOT);
        if shm.is_dir() {
            shm.join(DIR_NAME)
        } else {
            std::env::temp_dir().join(DIR_NAME)
        }
    }

    pub fn with_invalidator(mut self, invalidator: Invalidator) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `key` is (or would be) materialized.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.php", sanitize_key(key)))
    }

    pub fn is_materialized(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Writes `content` for `key` and returns its path.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the target, so readers see either the old file or
    /// the complete new one.
    pub fn write(&self, key: &str, content: &str) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir)?;

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;

        let path = self.path_for(key);
        temp.persist(&path).map_err(|e| e.error)?;
        debug!("Materialized {} to {}", key, path.display());

        if let Some(invalidate) = &self.invalidator {
            invalidate(&path);
        }
        Ok(path)
    }
}

impl Default for LocalMaterializer {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl std::fmt::Debug for LocalMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMaterializer")
            .field("dir", &self.dir)
            .field("invalidator", &self.invalidator.is_some())
            .finish()
    }
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
