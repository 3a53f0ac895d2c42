//! Init command implementation

use std::io::Write;
use std::path::PathBuf;

use miette::{IntoDiagnostic, Result};
use tracing::info;
use wpbridge_core::CONFIG_FILES;

const DEFAULT_CONFIG: &str = r#"{
  // Root of the legacy content tree
  "content_dir": "wp-content",
  "active_plugins": [],
  "cache": {
    "backend": "sled",
    "path": ".wpbridge-cache"
  },
  "interception": "autoload"
}
"#;

pub fn run_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILES[0]);

    loop {
        // create_new refuses to follow a planted symlink
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);

        match options.open(&config_path) {
            Ok(mut file) => {
                file.write_all(DEFAULT_CONFIG.as_bytes()).into_diagnostic()?;
                info!("Created {}", config_path.display());
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if !force {
                    return Err(miette::miette!(
                        "Config file already exists. Use --force to overwrite."
                    ));
                }

                match std::fs::remove_file(&config_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_diagnostic(),
                }
            }
            Err(e) => return Err(e).into_diagnostic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wpbridge_core::BridgeConfig;

    #[test]
    fn test_default_config_is_valid() {
        let config = BridgeConfig::from_json(DEFAULT_CONFIG).unwrap();
        assert!(config.active_plugins.is_empty());
        assert!(!config.allow_eval_fallback);
    }
}
