//! Parallel cache warm-up.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;
use wpbridge_transform::Context;

use crate::{BridgeError, TransformerEngine};

/// Files compiled and files that failed, with the error.
pub type WarmResult = (usize, Vec<(PathBuf, BridgeError)>);

/// Every `.php` file below `root`, in a stable order.
pub fn collect_legacy_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "php"))
        .collect()
}

/// Compiles `files` in parallel so later loads hit the cache.
///
/// `context_for` builds the compilation context of each file. A failing
/// file does not stop the others.
pub fn warm_cache<F>(engine: &TransformerEngine, files: &[PathBuf], context_for: F) -> WarmResult
where
    F: Fn(&Path) -> Context + Sync,
{
    let results: Vec<Result<(), (PathBuf, BridgeError)>> = files
        .par_iter()
        .map(|path| {
            engine
                .compile_file(path, &context_for(path))
                .map(|_| ())
                .map_err(|e| (path.clone(), e))
        })
        .collect();

    let mut compiled = 0;
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(()) => compiled += 1,
            Err((path, error)) => {
                warn!("Failed to compile {}: {}", path.display(), error);
                failures.push((path, error));
            }
        }
    }

    if let Some(storage) = engine.storage()
        && let Err(e) = storage.flush()
    {
        warn!("Failed to flush compiled storage: {}", e);
    }

    info!("Warmed {} of {} files", compiled, files.len());
    (compiled, failures)
}
