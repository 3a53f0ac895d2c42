//! Transformer engine.
//!
//! Compiles legacy source by selecting the relevant transformers through the
//! pattern index, applying them in priority order and caching the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use wpbridge_cache::{CompiledStorage, cache_key};
use wpbridge_manifest::TransformerConfig;
use wpbridge_transform::{
    Context, PatternIndex, Transformer, TransformerFactory, TransformerRepository,
};

use crate::{BridgeError, LegacyUnit};

/// Tag under which an extension's own declarations are registered.
pub fn extension_tag(slug: &str) -> String {
    format!("plugin:{slug}")
}

/// Selects, orders and applies transformers, caching compiled output.
///
/// The repository and index are filled at startup and read-only afterwards.
/// To change the transformer set, build a new engine and swap it in.
#[derive(Debug, Default)]
pub struct TransformerEngine {
    repository: TransformerRepository,
    index: PatternIndex,
    storage: Option<Arc<CompiledStorage>>,
}

impl TransformerEngine {
    pub fn new(repository: TransformerRepository, storage: Option<Arc<CompiledStorage>>) -> Self {
        Self {
            repository,
            index: PatternIndex::new(),
            storage,
        }
    }

    pub fn repository(&self) -> &TransformerRepository {
        &self.repository
    }

    pub fn index(&self) -> &PatternIndex {
        &self.index
    }

    pub fn storage(&self) -> Option<&Arc<CompiledStorage>> {
        self.storage.as_ref()
    }

    /// Considers transformer `id` whenever any of `keywords` occurs as a
    /// token of the compiled source.
    pub fn index_transformer<I, S>(&mut self, id: &str, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.index.index_transformer(id, keywords);
    }

    /// Builds, registers and indexes every enabled declaration.
    ///
    /// Declarations that cannot be built are skipped with a warning.
    /// Returns the number installed.
    pub fn install(&mut self, configs: &[TransformerConfig], factory: &TransformerFactory) -> usize {
        let mut installed = 0;

        for config in configs {
            if !config.enabled {
                debug!("Transformer '{}' is disabled", config.id);
                continue;
            }

            let transformer = match factory.build(config) {
                Ok(transformer) => transformer,
                Err(e) => {
                    warn!("Skipping transformer '{}': {}", config.id, e);
                    continue;
                }
            };

            let tags = config
                .extension
                .as_deref()
                .map(|slug| vec![extension_tag(slug)])
                .unwrap_or_default();
            self.repository.register_tagged(&config.id, transformer, tags);
            self.index.index_transformer(&config.id, &config.keywords);
            installed += 1;
        }

        debug!("Installed {} of {} transformers", installed, configs.len());
        installed
    }

    /// Compiles the file at `path` under its `(path, mtime)` cache key.
    ///
    /// With storage configured the result is the materialized artifact and
    /// the source is only read on a cache miss. Without storage the
    /// compiled text is returned for evaluation.
    pub fn compile_file(&self, path: &Path, context: &Context) -> Result<CompiledUnit, BridgeError> {
        let Some(storage) = self.storage.as_deref() else {
            let source = fs::read_to_string(path)?;
            return Ok(CompiledUnit::Inline(self.compile_with_context(&source, "", context)?));
        };

        let key = cache_key(path)?;
        if !storage.has(&key)? {
            let source = fs::read_to_string(path)?;
            self.compile_with_context(&source, &key, context)?;
        }
        Ok(CompiledUnit::Materialized(storage.get_path(&key)?))
    }

    /// Compiled text of the file at `path`, served from storage when cached.
    pub fn compile_file_source(&self, path: &Path, context: &Context) -> Result<String, BridgeError> {
        let key = if self.storage.is_some() {
            cache_key(path)?
        } else {
            String::new()
        };
        if let Some(storage) = self.storage.as_deref()
            && let Some(cached) = storage.get(&key)?
        {
            return Ok(cached);
        }
        let source = fs::read_to_string(path)?;
        self.compile_with_context(&source, &key, context)
    }

    /// Compiles `source` without knowledge of where it came from.
    pub fn compile(&self, source: &str, cache_key: &str) -> Result<String, BridgeError> {
        self.compile_with_context(source, cache_key, &Context::unknown())
    }

    /// Compiles `source`, evaluating requirements against `context`.
    ///
    /// An empty `cache_key` disables caching for this call. A transformer
    /// error aborts the compilation and nothing is cached.
    pub fn compile_with_context(
        &self,
        source: &str,
        cache_key: &str,
        context: &Context,
    ) -> Result<String, BridgeError> {
        let storage = self.storage.as_deref().filter(|_| !cache_key.is_empty());

        if let Some(storage) = storage
            && let Some(cached) = storage.get(cache_key)?
        {
            debug!("Compile cache hit for {}", cache_key);
            return Ok(cached);
        }

        let relevant = self.index.relevant_ids(source);
        if relevant.is_empty() {
            if let Some(storage) = storage {
                storage.put(cache_key, source)?;
            }
            return Ok(source.to_string());
        }

        let mut selected: Vec<Arc<dyn Transformer>> = Vec::with_capacity(relevant.len());
        for id in relevant {
            let Some(transformer) = self.repository.load(id) else {
                debug!("Indexed transformer '{}' is not registered; skipping", id);
                continue;
            };
            if transformer.requirements().iter().all(|r| r.check(context)) {
                selected.push(transformer);
            } else {
                debug!("Requirements of '{}' not met for {}", id, context.file_path.display());
            }
        }

        // Stable: equal priorities keep resolution order.
        selected.sort_by_key(|t| std::cmp::Reverse(t.priority()));

        let mut compiled = source.to_string();
        for transformer in &selected {
            compiled = transformer.transform(&compiled)?;
        }

        if let Some(storage) = storage {
            storage.put(cache_key, &compiled)?;
        }
        Ok(compiled)
    }
}

/// A compiled file, ready to hand to the host runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledUnit {
    /// Path of the materialized artifact.
    Materialized(PathBuf),
    /// Compiled text, produced when no storage is configured.
    Inline(String),
}

impl CompiledUnit {
    /// The unit to execute for a file compiled from `origin`.
    ///
    /// Inline text is only executable when the eval fallback is allowed.
    pub fn as_unit<'a>(&'a self, origin: &'a Path, allow_eval: bool) -> Result<LegacyUnit<'a>, BridgeError> {
        match self {
            Self::Materialized(path) => Ok(LegacyUnit::File(path)),
            Self::Inline(code) if allow_eval => {
                warn!("Evaluating {} without a compiled artifact", origin.display());
                Ok(LegacyUnit::Source { code, origin })
            }
            Self::Inline(_) => Err(BridgeError::config(format!(
                "No storage backend configured and eval fallback is disabled; cannot load {}",
                origin.display()
            ))),
        }
    }
}

/// The engine currently in use.
///
/// Readers take a cheap handle with [`current`](Self::current); a reload
/// builds a complete new engine and swaps it in, so compilations already in
/// flight finish against the engine they started with.
#[derive(Debug, Default)]
pub struct SharedEngine {
    current: RwLock<Arc<TransformerEngine>>,
}

impl SharedEngine {
    pub fn new(engine: TransformerEngine) -> Self {
        Self {
            current: RwLock::new(Arc::new(engine)),
        }
    }

    pub fn current(&self) -> Arc<TransformerEngine> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the engine and returns the previous one.
    pub fn swap(&self, engine: TransformerEngine) -> Arc<TransformerEngine> {
        let engine = Arc::new(engine);
        info!("Transformer engine reloaded ({} transformers)", engine.repository().len());
        std::mem::replace(&mut *self.current.write(), engine)
    }
}
