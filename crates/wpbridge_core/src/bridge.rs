//! Wiring of every component from a [`BridgeConfig`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use wpbridge_cache::{CompiledStorage, LocalMaterializer, MemoryBackend, SledBackend, StorageBackend};
use wpbridge_manifest::InstalledExtension;
use wpbridge_transform::{Context, TransformerFactory, TransformerRepository};

use crate::config::{BridgeConfig, CacheBackendKind, InterceptionMode};
use crate::loader::TransformerLoader;
use crate::module_loader::{LoadReport, ModuleLoader};
use crate::warm::{WarmResult, collect_legacy_files, warm_cache};
use crate::{
    AutoloadInterceptor, BridgeError, ClassResolverChain, ContextFactory, GlobalScope,
    HookManager, HookRegistry, Interceptor, IsolationSandbox, LegacyExecutor, SharedEngine,
    StreamInterceptor, TransformerEngine,
};

/// Opens the storage selected by `config`.
pub fn open_storage(config: &BridgeConfig) -> Result<Option<Arc<CompiledStorage>>, BridgeError> {
    let backend: Arc<dyn StorageBackend> = match config.cache.backend {
        CacheBackendKind::Sled => Arc::new(SledBackend::open(config.cache_path())?),
        CacheBackendKind::Memory => Arc::new(MemoryBackend::new()),
        CacheBackendKind::None => {
            debug!("Compiled-artifact storage disabled");
            return Ok(None);
        }
    };

    let materialize_dir = config
        .materialize_dir()
        .unwrap_or_else(LocalMaterializer::default_dir);
    debug!(
        "Compiled artifacts in {} backend, materialized under {}",
        backend.name(),
        materialize_dir.display()
    );
    Ok(Some(Arc::new(CompiledStorage::new(
        backend,
        LocalMaterializer::new(materialize_dir),
    ))))
}

/// The assembled bridge.
pub struct Bridge {
    config: BridgeConfig,
    factory: TransformerFactory,
    storage: Option<Arc<CompiledStorage>>,
    engine: Arc<SharedEngine>,
    sandbox: Arc<IsolationSandbox>,
    contexts: ContextFactory,
    extensions: Vec<InstalledExtension>,
    autoload: Option<Arc<AutoloadInterceptor>>,
    streams: Option<Arc<StreamInterceptor>>,
    interceptor: Arc<dyn Interceptor>,
    classes: ClassResolverChain,
    modules: ModuleLoader,
}

impl Bridge {
    /// Builds a bridge with an in-process hook registry.
    pub fn new(config: BridgeConfig, executor: Arc<dyn LegacyExecutor>) -> Result<Self, BridgeError> {
        Self::with_hooks(config, executor, Arc::new(HookRegistry::new()))
    }

    /// Builds a bridge promoting captured hooks into `hooks`.
    pub fn with_hooks(
        config: BridgeConfig,
        executor: Arc<dyn LegacyExecutor>,
        hooks: Arc<dyn HookManager>,
    ) -> Result<Self, BridgeError> {
        Self::with_factory(config, executor, hooks, TransformerFactory::default())
    }

    /// Builds a bridge whose declarations may name the extra types known
    /// to `factory`.
    pub fn with_factory(
        config: BridgeConfig,
        executor: Arc<dyn LegacyExecutor>,
        hooks: Arc<dyn HookManager>,
        factory: TransformerFactory,
    ) -> Result<Self, BridgeError> {
        let storage = open_storage(&config)?;
        if storage.is_none() && !config.allow_eval_fallback {
            return Err(BridgeError::config(
                "No storage backend configured; enable allow_eval_fallback to evaluate compiled code directly",
            ));
        }

        let (engine, extensions) = build_engine(&config, &factory, storage.clone())?;
        let engine = Arc::new(SharedEngine::new(engine));

        let contexts = ContextFactory::new()
            .with_extensions(&extensions)
            .with_environment(config.environment.clone());

        let mut sandbox = IsolationSandbox::new(hooks).with_purge_new_globals(config.purge_new_globals);
        if let Some(globals) = &config.globals {
            sandbox = sandbox.with_protected_globals(globals.iter().cloned());
        }
        let sandbox = Arc::new(sandbox);

        let mut classes = ClassResolverChain::new();
        let modules = ModuleLoader::new(
            Arc::clone(&engine),
            Arc::clone(&sandbox),
            Arc::clone(&executor),
            config.content_dir(),
        )
        .with_contexts(contexts.clone())
        .with_eval_fallback(config.allow_eval_fallback);

        let (autoload, streams, interceptor) = match config.interception {
            InterceptionMode::Autoload => {
                let autoload = Arc::new(
                    AutoloadInterceptor::new(Arc::clone(&engine), executor)
                        .with_contexts(contexts.clone())
                        .with_eval_fallback(config.allow_eval_fallback),
                );
                classes.prepend(autoload.clone());
                (Some(autoload.clone()), None, autoload as Arc<dyn Interceptor>)
            }
            InterceptionMode::Stream => {
                let streams =
                    Arc::new(StreamInterceptor::new(Arc::clone(&engine)).with_contexts(contexts.clone()));
                (None, Some(streams.clone()), streams as Arc<dyn Interceptor>)
            }
        };
        let modules = modules.with_interceptor(Arc::clone(&interceptor));

        Ok(Self {
            config,
            factory,
            storage,
            engine,
            sandbox,
            contexts,
            extensions,
            autoload,
            streams,
            interceptor,
            classes,
            modules,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The engine currently in use.
    pub fn engine(&self) -> Arc<TransformerEngine> {
        self.engine.current()
    }

    pub fn storage(&self) -> Option<&Arc<CompiledStorage>> {
        self.storage.as_ref()
    }

    pub fn sandbox(&self) -> &Arc<IsolationSandbox> {
        &self.sandbox
    }

    pub fn modules(&self) -> &ModuleLoader {
        &self.modules
    }

    /// Extensions detected when the bridge was built.
    pub fn extensions(&self) -> &[InstalledExtension] {
        &self.extensions
    }

    pub fn autoload(&self) -> Option<&Arc<AutoloadInterceptor>> {
        self.autoload.as_ref()
    }

    pub fn streams(&self) -> Option<&Arc<StreamInterceptor>> {
        self.streams.as_ref()
    }

    /// Class resolvers, the autoload interceptor first.
    pub fn classes(&self) -> &ClassResolverChain {
        &self.classes
    }

    /// Registers every installed extension with the interceptor up front,
    /// rather than as its files are loaded.
    pub fn watch_extensions(&self) {
        for extension in &self.extensions {
            self.interceptor
                .watch_extension(&extension.slug, &extension.path);
        }
    }

    /// Resolves `class` through the resolver chain.
    pub fn autoload_class(&self, class: &str, scope: &mut GlobalScope) -> Result<bool, BridgeError> {
        self.classes.resolve(class, scope)
    }

    /// Rediscovers declarations and swaps in a freshly built engine.
    /// Returns the number of installed transformers.
    pub fn reload(&self) -> Result<usize, BridgeError> {
        let (engine, _) = build_engine(&self.config, &self.factory, self.storage.clone())?;
        let installed = engine.repository().len();
        self.engine.swap(engine);
        Ok(installed)
    }

    /// Loads must-use plugins, then the active plugins, then the active
    /// theme.
    pub fn boot(&self) -> LoadReport {
        let mut report = self.modules.load_mu_plugins(&self.config.mu_plugins_dir());
        report.merge(
            self.modules
                .load_plugins(&self.config.plugins_dir(), &self.config.active_plugins),
        );
        if let Some(theme) = &self.config.active_theme {
            report.merge(self.modules.load_theme(&self.config.themes_dir(), theme));
        }
        info!(
            "Boot finished: {} loaded, {} failed",
            report.loaded.len(),
            report.failed.len()
        );
        report
    }

    /// Precompiles every `.php` file of every detected extension.
    pub fn warm(&self) -> Result<WarmResult, BridgeError> {
        if self.storage.is_none() {
            return Err(BridgeError::config("Cannot warm the cache without a storage backend"));
        }

        let files: Vec<PathBuf> = self
            .extensions
            .iter()
            .flat_map(|extension| collect_legacy_files(&extension.path))
            .collect();

        let engine = self.engine.current();
        Ok(warm_cache(&engine, &files, |path| self.context_for(path)))
    }

    /// Compilation context of `path`, owned by the detected extension whose
    /// directory contains it.
    pub fn context_for(&self, path: &Path) -> Context {
        let owner = self
            .extensions
            .iter()
            .find(|extension| path.starts_with(&extension.path))
            .map(|extension| extension.slug.as_str());
        self.contexts.for_file(path, owner)
    }

    pub fn contexts(&self) -> &ContextFactory {
        &self.contexts
    }
}

/// Discovers declarations and installs them into a new engine.
fn build_engine(
    config: &BridgeConfig,
    factory: &TransformerFactory,
    storage: Option<Arc<CompiledStorage>>,
) -> Result<(TransformerEngine, Vec<InstalledExtension>), BridgeError> {
    let loader = TransformerLoader::new(config.plugins_dir(), config.config_dir());
    let discovery = loader.discover_all()?;

    let mut engine = TransformerEngine::new(TransformerRepository::new(), storage);
    engine.install(&discovery.transformers, factory);
    Ok((engine, discovery.extensions))
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("content_dir", &self.config.content_dir())
            .field("extensions", &self.extensions.len())
            .field("interception", &self.config.interception)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}
