//! Load command implementation

use miette::Result;

use super::dry_bridge;
use crate::cli::Cli;

pub fn run_load(cli: &Cli) -> Result<bool> {
    let bridge = dry_bridge(cli)?;
    let report = bridge.boot();

    for path in &report.loaded {
        println!("loaded {}", path.display());
    }
    for (path, reason) in &report.failed {
        println!("failed {}: {}", path.display(), reason);
    }
    println!(
        "\nLoaded {} files, {} failed",
        report.loaded.len(),
        report.failed.len()
    );
    Ok(!report.is_success())
}
