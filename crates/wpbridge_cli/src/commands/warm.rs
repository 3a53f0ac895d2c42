//! Warm command implementation

use miette::{IntoDiagnostic, Result};

use super::dry_bridge;
use crate::cli::Cli;

pub fn run_warm(cli: &Cli) -> Result<bool> {
    let bridge = dry_bridge(cli)?;
    let (compiled, failures) = bridge.warm().into_diagnostic()?;

    for (path, error) in &failures {
        eprintln!("{}: {}", path.display(), error);
    }
    println!("Compiled {} files, {} failed", compiled, failures.len());
    Ok(!failures.is_empty())
}
