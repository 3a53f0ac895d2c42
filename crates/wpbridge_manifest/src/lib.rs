//! # wpbridge_manifest
//!
//! On-disk inputs of the bridge: extension manifest headers, the version
//! ordering used by constraints and requirements, and transformer
//! declarations (user configuration and registry snapshots).

pub mod declaration;
pub mod headers;
pub mod version;

pub use declaration::{
    DeclarationSource, REGISTRY_SNAPSHOT_FILE, RegistryRecord, RegistrySnapshot,
    RequirementConfig, TransformerConfig, load_user_config, parse_user_config,
};
pub use headers::{
    ExtensionHeaders, HEADER_SCAN_BYTES, InstalledExtension, detect_extensions, find_entry_file,
    parse_headers,
};
pub use version::{VersionConstraint, compare_versions, compare_with, matches_version};

use thiserror::Error;

/// Error type for manifest and declaration operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to parse declarations: {0}")]
    Parse(String),
    #[error("Invalid declaration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Declaration validation failed: {0}")]
    ValidationError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
