//! Command implementations

pub mod cache;
pub mod compile;
pub mod discover;
pub mod init;
pub mod load;
pub mod warm;

use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use tracing::debug;
use wpbridge_core::{Bridge, BridgeConfig, CacheBackendKind, NullExecutor};

use crate::cli::Cli;

/// Loads the configuration named on the command line, else the one in the
/// current directory, else the defaults.
pub fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = if let Some(ref path) = cli.config {
        BridgeConfig::from_file(path).into_diagnostic()?
    } else {
        find_config()?
    };

    if cli.no_cache {
        config.cache.backend = CacheBackendKind::Memory;
    }
    Ok(config)
}

fn find_config() -> Result<BridgeConfig> {
    let cwd = std::env::current_dir().into_diagnostic()?;
    match BridgeConfig::discover(&cwd) {
        Some(path) => {
            debug!("Using config {}", path.display());
            BridgeConfig::from_file(&path).into_diagnostic()
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(BridgeConfig::new())
        }
    }
}

/// A bridge that logs what it would execute instead of running it.
pub fn dry_bridge(cli: &Cli) -> Result<Bridge> {
    let config = load_config(cli)?;
    Bridge::new(config, Arc::new(NullExecutor)).into_diagnostic()
}
