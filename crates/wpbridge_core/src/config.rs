//! Bridge configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use jsonc_parser::ParseOptions;
use jsonschema::Validator;
use serde::{Deserialize, Serialize};

use crate::BridgeError;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/bridge.json");
static CONFIG_SCHEMA: OnceLock<Validator> = OnceLock::new();

/// File names probed by [`BridgeConfig::discover`], in order.
pub const CONFIG_FILES: [&str; 2] = ["bridge.jsonc", "bridge.json"];

/// Where compiled artifacts are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Durable embedded store.
    #[default]
    Sled,
    /// Process memory only.
    Memory,
    /// No storage. Loading then requires the eval fallback.
    None,
}

/// Compiled-artifact storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// Database directory of the sled backend.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Directory for materialized artifacts. Defaults to a memory-backed
    /// location when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materialize_dir: Option<PathBuf>,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".wpbridge-cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            path: default_cache_path(),
            materialize_dir: None,
        }
    }
}

/// How legacy file loads are intercepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterceptionMode {
    /// Class-load interception.
    #[default]
    Autoload,
    /// Per-extension stream protocols.
    Stream,
}

/// Configuration for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Root of the legacy content tree.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Defaults to `<content_dir>/plugins`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins_dir: Option<PathBuf>,

    /// Defaults to `<content_dir>/mu-plugins`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mu_plugins_dir: Option<PathBuf>,

    /// Defaults to `<content_dir>/themes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes_dir: Option<PathBuf>,

    /// Directory of `transformers.json` and `registry.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,

    /// Active plugins in load order.
    #[serde(default)]
    pub active_plugins: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_theme: Option<String>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub interception: InterceptionMode,

    /// Evaluate compiled text directly when no storage is configured.
    #[serde(default)]
    pub allow_eval_fallback: bool,

    /// Replaces the sandbox's protected global names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globals: Option<Vec<String>>,

    /// Remove globals created by a sandboxed run.
    #[serde(default)]
    pub purge_new_globals: bool,

    /// Values copied into every compilation context.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Base directory for resolving relative paths.
    /// This is usually the directory containing the configuration file.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("wp-content")
}

impl BridgeConfig {
    /// Creates a configuration with every default.
    pub fn new() -> Self {
        Self {
            content_dir: default_content_dir(),
            plugins_dir: None,
            mu_plugins_dir: None,
            themes_dir: None,
            config_dir: None,
            active_plugins: Vec::new(),
            active_theme: None,
            cache: CacheConfig::default(),
            interception: InterceptionMode::default(),
            allow_eval_fallback: false,
            globals: None,
            purge_new_globals: false,
            environment: BTreeMap::new(),
            base_dir: None,
        }
    }

    /// Loads configuration from a file.
    ///
    /// Supports `bridge.jsonc`, `bridge.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| BridgeError::config(format!("Failed to read config: {}", e)))?;

        let mut config = Self::from_json(&content)?;

        if let Some(parent) = path.parent() {
            config.base_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Finds the first configuration file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Parses configuration from JSON (comments allowed) with schema
    /// validation.
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let value = jsonc_parser::parse_to_serde_value(json, &ParseOptions::default())
            .map_err(|e| BridgeError::config(format!("Invalid JSON: {}", e)))?
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        let schema = CONFIG_SCHEMA.get_or_init(|| {
            let schema_json: serde_json::Value =
                serde_json::from_str(SCHEMA_JSON).expect("Invalid embedded bridge schema");
            Validator::new(&schema_json).expect("Invalid bridge schema compilation")
        });

        if let Err(e) = schema.validate(&value) {
            let error_msg = format!("{} at {}", e, e.instance_path());
            return Err(BridgeError::config(format!(
                "Config validation failed: {}",
                error_msg
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| BridgeError::config(format!("Invalid config: {}", e)))
    }

    /// `path` resolved against the base directory when relative.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn content_dir(&self) -> PathBuf {
        self.resolve(&self.content_dir)
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.dir_or(&self.plugins_dir, "plugins")
    }

    pub fn mu_plugins_dir(&self) -> PathBuf {
        self.dir_or(&self.mu_plugins_dir, "mu-plugins")
    }

    pub fn themes_dir(&self) -> PathBuf {
        self.dir_or(&self.themes_dir, "themes")
    }

    pub fn config_dir(&self) -> Option<PathBuf> {
        self.config_dir.as_deref().map(|dir| self.resolve(dir))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.cache.path)
    }

    pub fn materialize_dir(&self) -> Option<PathBuf> {
        self.cache.materialize_dir.as_deref().map(|dir| self.resolve(dir))
    }

    fn dir_or(&self, configured: &Option<PathBuf>, default: &str) -> PathBuf {
        match configured {
            Some(dir) => self.resolve(dir),
            None => self.content_dir().join(default),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_json("{}").unwrap();
        assert_eq!(config.content_dir, PathBuf::from("wp-content"));
        assert_eq!(config.cache.backend, CacheBackendKind::Sled);
        assert_eq!(config.cache.path, PathBuf::from(".wpbridge-cache"));
        assert_eq!(config.interception, InterceptionMode::Autoload);
        assert!(!config.allow_eval_fallback);
        assert!(!config.purge_new_globals);
        assert_eq!(config.plugins_dir(), PathBuf::from("wp-content/plugins"));
    }

    #[test]
    fn test_from_json_with_comments() {
        let json = r#"{
            // legacy tree
            "content_dir": "/srv/site/wp-content",
            "active_plugins": ["woocommerce/woocommerce.php", "sample"],
            "active_theme": "classic",
            "cache": { "backend": "memory" },
            "interception": "stream",
            "globals": ["current_user", "wpdb"],
            "environment": { "env": "staging" }
        }"#;
        let config = BridgeConfig::from_json(json).unwrap();

        assert_eq!(config.mu_plugins_dir(), PathBuf::from("/srv/site/wp-content/mu-plugins"));
        assert_eq!(config.active_plugins.len(), 2);
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert_eq!(config.interception, InterceptionMode::Stream);
        assert_eq!(config.globals.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(config.environment.get("env").map(String::as_str), Some("staging"));
    }

    #[test]
    fn test_schema_rejects_unknown_backend() {
        let result = BridgeConfig::from_json(r#"{ "cache": { "backend": "redis" } }"#);
        assert!(matches!(result, Err(BridgeError::Config(msg)) if msg.contains("validation")));
    }

    #[test]
    fn test_schema_rejects_unknown_field() {
        assert!(BridgeConfig::from_json(r#"{ "plugins": [] }"#).is_err());
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        fs::write(
            &path,
            r#"{ "content_dir": "content", "config_dir": "conf", "cache": { "path": "/var/cache/wpb" } }"#,
        )
        .unwrap();

        assert_eq!(BridgeConfig::discover(dir.path()), Some(path.clone()));
        let config = BridgeConfig::from_file(&path).unwrap();

        assert_eq!(config.content_dir(), dir.path().join("content"));
        assert_eq!(config.themes_dir(), dir.path().join("content/themes"));
        assert_eq!(config.config_dir(), Some(dir.path().join("conf")));
        assert_eq!(config.cache_path(), PathBuf::from("/var/cache/wpb"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(BridgeConfig::discover(dir.path()).is_none());
        assert!(matches!(
            BridgeConfig::from_file(dir.path().join("bridge.json")),
            Err(BridgeError::Config(_))
        ));
    }
}
