//! Compilation context.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata about the file being compiled. Built per compilation and
/// handed to requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    /// File being compiled. Empty when unknown.
    pub file_path: PathBuf,
    /// Slug of the owning extension. Empty when unknown.
    pub extension: String,
    /// Version of the owning extension. Empty when unknown.
    pub extension_version: String,
    /// Deployment environment values.
    pub environment: BTreeMap<String, String>,
}

impl Context {
    /// A context that knows nothing about the compiled source.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Creates a context for a file outside any known extension.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    /// Creates a context for a file of `extension` at `version`.
    pub fn for_extension(
        file_path: impl AsRef<Path>,
        extension: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            extension: extension.into(),
            extension_version: version.into(),
            environment: BTreeMap::new(),
        }
    }

    /// Replaces the environment map.
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }
}
