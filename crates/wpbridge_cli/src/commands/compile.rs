//! Compile command implementation

use std::path::Path;

use miette::{IntoDiagnostic, Result};

use super::dry_bridge;
use crate::cli::Cli;

pub fn run_compile(cli: &Cli, file: &Path, extension: Option<&str>) -> Result<()> {
    if !file.is_file() {
        return Err(miette::miette!("File not found: {}", file.display()));
    }

    let bridge = dry_bridge(cli)?;
    let context = match extension {
        Some(slug) => bridge.contexts().for_file(file, Some(slug)),
        None => bridge.context_for(file),
    };

    let compiled = bridge
        .engine()
        .compile_file_source(file, &context)
        .into_diagnostic()?;
    print!("{compiled}");
    Ok(())
}
