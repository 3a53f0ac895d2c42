//! Registry sources: transformer declarations published for specific
//! extensions and versions.

use std::path::PathBuf;

use tracing::debug;
use wpbridge_manifest::{RegistryRecord, RegistrySnapshot, TransformerConfig, matches_version};

use crate::BridgeError;

/// Supplies registry records and resolves them for installed extensions.
pub trait RegistrySource: Send + Sync {
    /// All records known to this source.
    fn records(&self) -> Result<Vec<RegistryRecord>, BridgeError>;

    /// Declarations for extension `slug` at `version`: enabled records for
    /// that slug whose version constraint accepts `version`.
    fn transformers_for(&self, slug: &str, version: &str) -> Result<Vec<TransformerConfig>, BridgeError> {
        Ok(self
            .records()?
            .iter()
            .filter(|record| record.enabled && record.plugin_slug == slug)
            .filter(|record| {
                let accepted = matches_version(version, &record.version_constraint);
                if !accepted {
                    debug!(
                        "Registry transformer '{}' does not apply to {} {} ({})",
                        record.transformer_id, slug, version, record.version_constraint
                    );
                }
                accepted
            })
            .map(|record| record.to_config(slug))
            .collect())
    }
}

/// Records shipped with the bridge, used when no marketplace snapshot has
/// been synced.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRegistry;

impl RegistrySource for BuiltinRegistry {
    fn records(&self) -> Result<Vec<RegistryRecord>, BridgeError> {
        Ok(vec![RegistryRecord {
            plugin_slug: "woocommerce".to_string(),
            transformer_id: "wc_orders".to_string(),
            kind: "woocommerce_orders".to_string(),
            keywords: vec![
                "update_post_meta".to_string(),
                "wc_get_orders".to_string(),
                "WC_Order".to_string(),
            ],
            version_constraint: ">=3.0".to_string(),
            priority: Some(80),
            enabled: true,
            options: serde_json::Value::Null,
            requires: Vec::new(),
        }])
    }
}

/// Records read from a marketplace snapshot file. A missing file yields no
/// records.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl RegistrySource for FileRegistry {
    fn records(&self) -> Result<Vec<RegistryRecord>, BridgeError> {
        Ok(RegistrySnapshot::load(&self.path)?
            .map(|snapshot| snapshot.transformers)
            .unwrap_or_default())
    }
}
