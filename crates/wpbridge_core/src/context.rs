//! Compilation contexts for files of known extensions.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use wpbridge_manifest::InstalledExtension;
use wpbridge_transform::Context;

/// Builds a [`Context`] for each compiled file from the detected extension
/// versions and the configured environment.
#[derive(Debug, Clone, Default)]
pub struct ContextFactory {
    versions: HashMap<String, String>,
    environment: BTreeMap<String, String>,
}

impl ContextFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the versions of detected extensions.
    pub fn with_extensions<'a>(mut self, extensions: impl IntoIterator<Item = &'a InstalledExtension>) -> Self {
        for extension in extensions {
            self.versions
                .insert(extension.slug.clone(), extension.version.clone());
        }
        self
    }

    /// Records a single extension version.
    pub fn with_version(mut self, slug: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(slug.into(), version.into());
        self
    }

    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn version_of(&self, slug: &str) -> Option<&str> {
        self.versions.get(slug).map(String::as_str)
    }

    /// Context for `path`, owned by extension `slug` when known. An
    /// extension that was never detected gets an empty version.
    pub fn for_file(&self, path: &Path, slug: Option<&str>) -> Context {
        let context = match slug {
            Some(slug) => Context::for_extension(path, slug, self.version_of(slug).unwrap_or_default()),
            None => Context::new(path),
        };
        context.with_environment(self.environment.clone())
    }
}
