//! Transformer declarations.
//!
//! A declaration names a transformer, the implementing type that builds it,
//! the keywords it is indexed under and the extension it belongs to.
//! Declarations come from three places: the built-in set, the registry
//! (a snapshot synced from the transformer marketplace) and the user's
//! `transformers.json`.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use jsonc_parser::ParseOptions;
use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::ManifestError;

// Path is relative to this file: ../../../schemas/v1/transformers.json
const TRANSFORMERS_SCHEMA_JSON: &str = include_str!("../../../schemas/v1/transformers.json");

static TRANSFORMERS_SCHEMA: OnceLock<Validator> = OnceLock::new();

/// File names probed for user declarations, in order.
pub const USER_CONFIG_FILES: [&str; 2] = ["transformers.jsonc", "transformers.json"];

/// File name of the registry snapshot.
pub const REGISTRY_SNAPSHOT_FILE: &str = "registry.json";

/// Default priority of registry records that do not declare one.
pub const DEFAULT_REGISTRY_PRIORITY: i32 = 100;

/// Where a declaration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationSource {
    #[default]
    Builtin,
    Registry,
    User,
}

/// A transformer declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    pub id: String,

    /// Implementing type, resolved through the transformer factory.
    /// User declarations may omit it to patch an earlier declaration.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Overrides the transformer's intrinsic priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    /// Slug of the extension this declaration was resolved for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Type-specific options (`search`/`replace` for `replace`, and so on).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<RequirementConfig>,

    #[serde(default)]
    pub source: DeclarationSource,
}

fn default_enabled() -> bool {
    true
}

impl TransformerConfig {
    /// Creates an enabled built-in declaration.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            id: id.into(),
            kind: Some(kind.into()),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            enabled: true,
            priority: None,
            extension: None,
            options: Value::Null,
            requires: Vec::new(),
            source: DeclarationSource::Builtin,
        }
    }

    /// Applies a later declaration with the same id on top of this one.
    ///
    /// Fields the overlay leaves unset keep their current value; `enabled`
    /// and `source` always come from the overlay.
    pub fn overlay(&mut self, other: TransformerConfig) {
        if other.kind.is_some() {
            self.kind = other.kind;
        }
        if !other.keywords.is_empty() {
            self.keywords = other.keywords;
        }
        if other.priority.is_some() {
            self.priority = other.priority;
        }
        if other.extension.is_some() {
            self.extension = other.extension;
        }
        if !other.options.is_null() {
            self.options = other.options;
        }
        if !other.requires.is_empty() {
            self.requires = other.requires;
        }
        self.enabled = other.enabled;
        self.source = other.source;
    }
}

/// A declarative requirement: the compiled extension must be `extension`,
/// at a version satisfying `operator version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementConfig {
    pub extension: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default = "default_requirement_version")]
    pub version: String,
}

fn default_operator() -> String {
    ">=".to_string()
}

fn default_requirement_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Deserialize)]
struct UserTransformerFile {
    #[serde(default)]
    transformers: Vec<TransformerConfig>,
}

/// Parses user declarations (JSON with comments allowed).
pub fn parse_user_config(text: &str) -> Result<Vec<TransformerConfig>, ManifestError> {
    let value = jsonc_parser::parse_to_serde_value(text, &ParseOptions::default())
        .map_err(|e| ManifestError::Parse(e.to_string()))?
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    let schema = TRANSFORMERS_SCHEMA.get_or_init(|| {
        let schema_json: Value = serde_json::from_str(TRANSFORMERS_SCHEMA_JSON)
            .expect("Invalid embedded transformers schema");
        Validator::new(&schema_json).expect("Invalid transformers schema compilation")
    });

    if let Err(e) = schema.validate(&value) {
        return Err(ManifestError::ValidationError(format!(
            "{} at {}",
            e,
            e.instance_path()
        )));
    }

    let file: UserTransformerFile = serde_json::from_value(value)?;
    Ok(file
        .transformers
        .into_iter()
        .map(|mut config| {
            config.source = DeclarationSource::User;
            config
        })
        .collect())
}

/// Loads user declarations from `config_dir`.
///
/// A missing file is not an error and yields no declarations.
pub fn load_user_config(config_dir: &Path) -> Result<Vec<TransformerConfig>, ManifestError> {
    for name in USER_CONFIG_FILES {
        let path = config_dir.join(name);
        if path.is_file() {
            debug!("Loading transformer declarations from {}", path.display());
            let content = fs::read_to_string(&path)?;
            return parse_user_config(&content);
        }
    }
    Ok(Vec::new())
}

/// One record of the registry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub plugin_slug: String,
    pub transformer_id: String,
    #[serde(rename = "type", alias = "transformer_class")]
    pub kind: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_constraint")]
    pub version_constraint: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub requires: Vec<RequirementConfig>,
}

fn default_constraint() -> String {
    "*".to_string()
}

impl RegistryRecord {
    /// Converts this record into a declaration for `slug`.
    pub fn to_config(&self, slug: &str) -> TransformerConfig {
        TransformerConfig {
            id: self.transformer_id.clone(),
            kind: Some(self.kind.clone()),
            keywords: self.keywords.clone(),
            enabled: true,
            priority: Some(self.priority.unwrap_or(DEFAULT_REGISTRY_PRIORITY)),
            extension: Some(slug.to_string()),
            options: self.options.clone(),
            requires: self.requires.clone(),
            source: DeclarationSource::Registry,
        }
    }
}

/// Registry snapshot as synced from the marketplace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub transformers: Vec<RegistryRecord>,
}

impl RegistrySnapshot {
    /// Loads a snapshot file. Returns `None` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}
