//! Cache command implementation

use std::path::Path;

use miette::{IntoDiagnostic, Result};
use tracing::debug;
use wpbridge_core::CompiledUnit;

use super::dry_bridge;
use crate::cli::Cli;

pub fn run_cache_path(cli: &Cli, file: &Path) -> Result<()> {
    if !file.is_file() {
        return Err(miette::miette!("File not found: {}", file.display()));
    }

    let bridge = dry_bridge(cli)?;
    let context = bridge.context_for(file);
    match bridge.engine().compile_file(file, &context).into_diagnostic()? {
        CompiledUnit::Materialized(path) => {
            debug!("{} is materialized", file.display());
            println!("{}", path.display());
            Ok(())
        }
        CompiledUnit::Inline(_) => Err(miette::miette!(
            "No storage backend is configured, nothing is materialized"
        )),
    }
}
