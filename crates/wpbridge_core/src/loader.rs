//! Transformer discovery.
//!
//! Declarations are merged from three sources, lowest precedence first:
//! the core set, the registry (per installed extension) and the user's
//! configuration. A later declaration with an existing id is overlaid on
//! the earlier one, so users can disable or retune anything by id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use wpbridge_manifest::{InstalledExtension, TransformerConfig, detect_extensions, load_user_config};
use wpbridge_transform::transformers::OPTION_FUNCTIONS;

use crate::BridgeError;
use crate::registry::{BuiltinRegistry, FileRegistry, RegistrySource};

/// Declarations that are always present.
pub fn core_declarations() -> Vec<TransformerConfig> {
    vec![
        TransformerConfig::new("global_to_container", "global_to_container", &["global"]),
        TransformerConfig::new("global_variable", "global_variable", &["$GLOBALS"]),
        TransformerConfig::new("wp_options", "wp_options", OPTION_FUNCTIONS),
        TransformerConfig::new("wpdb_direct_query", "wpdb_direct_query", &["$wpdb", "query"]),
        TransformerConfig::new("output_buffer", "output_buffer", &["echo", "print", "wp_die"]),
    ]
}

/// Uses the synced snapshot in `config_dir` when there is one, else the
/// built-in records.
pub fn default_registry(config_dir: Option<&Path>) -> Box<dyn RegistrySource> {
    let snapshot = config_dir.map(|dir| dir.join(wpbridge_manifest::REGISTRY_SNAPSHOT_FILE));
    match snapshot {
        Some(path) if path.is_file() => {
            debug!("Using registry snapshot {}", path.display());
            Box::new(FileRegistry::new(path))
        }
        _ => Box::new(BuiltinRegistry),
    }
}

/// Result of a discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Merged declarations in precedence order.
    pub transformers: Vec<TransformerConfig>,
    /// Extensions found under the plugins directory.
    pub extensions: Vec<InstalledExtension>,
}

/// Collects transformer declarations.
pub struct TransformerLoader {
    plugins_dir: PathBuf,
    config_dir: Option<PathBuf>,
    registry: Box<dyn RegistrySource>,
}

impl TransformerLoader {
    /// Creates a loader scanning `plugins_dir` for extensions and reading
    /// user declarations and the registry snapshot from `config_dir`.
    pub fn new(plugins_dir: impl Into<PathBuf>, config_dir: Option<PathBuf>) -> Self {
        let registry = default_registry(config_dir.as_deref());
        Self {
            plugins_dir: plugins_dir.into(),
            config_dir,
            registry,
        }
    }

    /// Replaces the registry source.
    pub fn with_registry(mut self, registry: impl RegistrySource + 'static) -> Self {
        self.registry = Box::new(registry);
        self
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Extensions installed under the plugins directory. A missing directory
    /// yields none.
    pub fn detect_extensions(&self) -> Vec<InstalledExtension> {
        detect_extensions(&self.plugins_dir)
    }

    /// Merged declarations.
    pub fn discover(&self) -> Result<Vec<TransformerConfig>, BridgeError> {
        Ok(self.discover_all()?.transformers)
    }

    /// Merged declarations together with the extensions they were resolved
    /// against.
    pub fn discover_all(&self) -> Result<Discovery, BridgeError> {
        let extensions = self.detect_extensions();
        let transformers = self.discover_for(&extensions)?;
        Ok(Discovery {
            transformers,
            extensions,
        })
    }

    /// Merged declarations for an already detected set of extensions.
    pub fn discover_for(
        &self,
        extensions: &[InstalledExtension],
    ) -> Result<Vec<TransformerConfig>, BridgeError> {
        let mut merged = Merged::default();
        merged.extend(core_declarations());

        for extension in extensions {
            let records = self
                .registry
                .transformers_for(&extension.slug, &extension.version)?;
            debug!(
                "{} registry transformers for {} {}",
                records.len(),
                extension.slug,
                extension.version
            );
            merged.extend(records);
        }

        if let Some(config_dir) = &self.config_dir {
            merged.extend(load_user_config(config_dir)?);
        }

        let transformers = merged.into_vec();
        info!(
            "Discovered {} transformers ({} enabled)",
            transformers.len(),
            transformers.iter().filter(|t| t.enabled).count()
        );
        Ok(transformers)
    }
}

impl std::fmt::Debug for TransformerLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerLoader")
            .field("plugins_dir", &self.plugins_dir)
            .field("config_dir", &self.config_dir)
            .finish_non_exhaustive()
    }
}

/// Declarations keyed by id, keeping first-seen order.
#[derive(Default)]
struct Merged {
    configs: Vec<TransformerConfig>,
    positions: HashMap<String, usize>,
}

impl Merged {
    fn extend(&mut self, configs: impl IntoIterator<Item = TransformerConfig>) {
        for config in configs {
            match self.positions.get(&config.id) {
                Some(&position) => self.configs[position].overlay(config),
                None => {
                    self.positions.insert(config.id.clone(), self.configs.len());
                    self.configs.push(config);
                }
            }
        }
    }

    fn into_vec(self) -> Vec<TransformerConfig> {
        self.configs
    }
}
