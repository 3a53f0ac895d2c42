//! Module loading.
//!
//! Files outside the legacy content directory are native and run directly.
//! Files inside it are legacy: their extension is handed to the
//! interceptors, then the file is compiled, materialized and executed
//! inside the isolation sandbox, and the hooks it registered are promoted.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use wpbridge_manifest::find_entry_file;

use crate::{
    BridgeError, ContextFactory, GlobalValue, Interceptor, IsolationSandbox, LegacyExecutor,
    LegacyUnit, SharedEngine,
};

/// Entry point of a native plugin component.
pub const NATIVE_PLUGIN_ENTRY: &str = "bootstrap.php";

/// Entry point of a native theme.
pub const NATIVE_THEME_ENTRY: &str = "Theme.php";

/// Entry point of a legacy theme.
pub const LEGACY_THEME_ENTRY: &str = "functions.php";

/// Outcome of a batch load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Files executed, in order.
    pub loaded: Vec<PathBuf>,
    /// Files that failed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl LoadReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Appends `other` after this report.
    pub fn merge(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.failed.extend(other.failed);
    }

    fn record(&mut self, path: PathBuf, result: Result<bool, BridgeError>) {
        match result {
            Ok(true) => self.loaded.push(path),
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                self.failed.push((path, e.to_string()));
            }
        }
    }
}

/// Loads native and legacy files.
pub struct ModuleLoader {
    engine: Arc<SharedEngine>,
    sandbox: Arc<IsolationSandbox>,
    executor: Arc<dyn LegacyExecutor>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    contexts: ContextFactory,
    content_dir: PathBuf,
    allow_eval: bool,
    loaded: Mutex<HashSet<PathBuf>>,
}

impl ModuleLoader {
    /// Creates a loader treating everything under `content_dir` as legacy.
    pub fn new(
        engine: Arc<SharedEngine>,
        sandbox: Arc<IsolationSandbox>,
        executor: Arc<dyn LegacyExecutor>,
        content_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            engine,
            sandbox,
            executor,
            interceptors: Vec::new(),
            contexts: ContextFactory::default(),
            content_dir: normalize(content_dir.as_ref()),
            allow_eval: false,
            loaded: Mutex::new(HashSet::new()),
        }
    }

    /// Adds an interceptor told about every legacy extension loaded.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_contexts(mut self, contexts: ContextFactory) -> Self {
        self.contexts = contexts;
        self
    }

    /// Allows evaluating compiled text when no storage is configured.
    pub fn with_eval_fallback(mut self, allow: bool) -> Self {
        self.allow_eval = allow;
        self
    }

    pub fn sandbox(&self) -> &Arc<IsolationSandbox> {
        &self.sandbox
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Whether `path` lies outside the legacy content directory.
    pub fn is_native(&self, path: &Path) -> bool {
        !normalize(path).starts_with(&self.content_dir)
    }

    /// Loads `path`, owned by the extension `slug` rooted at `base`.
    ///
    /// Returns `Ok(false)` when the file was already loaded.
    pub fn load_any_file(&self, path: &Path, base: &Path, slug: Option<&str>) -> Result<bool, BridgeError> {
        if !self.loaded.lock().insert(normalize(path)) {
            debug!("{} already loaded", path.display());
            return Ok(false);
        }

        if self.is_native(path) {
            debug!("Loading native file {}", path.display());
            self.executor
                .execute(LegacyUnit::Native(path), &mut self.sandbox.scope())?;
            return Ok(true);
        }

        if let Some(slug) = slug {
            for interceptor in &self.interceptors {
                interceptor.watch_extension(slug, base);
            }
        }
        self.load_sandboxed_file(path, slug)?;
        Ok(true)
    }

    /// Compiles `path`, runs the result in the sandbox and promotes the
    /// hooks it registered. Hooks captured by a failed run are dropped.
    pub fn load_sandboxed_file(&self, path: &Path, slug: Option<&str>) -> Result<(), BridgeError> {
        let context = self.contexts.for_file(path, slug);
        let compiled = self.engine.current().compile_file(path, &context)?;
        let unit = compiled.as_unit(path, self.allow_eval)?;

        let globals: [(&str, GlobalValue); 0] = [];
        let result = self
            .sandbox
            .run(globals, |scope| self.executor.execute(unit, scope));

        match result {
            Ok(()) => {
                self.sandbox.resolve();
                Ok(())
            }
            Err(e) => {
                let dropped = self.sandbox.discard_captured();
                if dropped > 0 {
                    debug!("Dropped {} hooks captured by {}", dropped, path.display());
                }
                Err(e.into())
            }
        }
    }

    /// Loads every `*.php` file directly inside `dir`, in name order.
    pub fn load_mu_plugins(&self, dir: &Path) -> LoadReport {
        let mut report = LoadReport::default();
        if !dir.is_dir() {
            debug!("No must-use directory at {}", dir.display());
            return report;
        }

        for path in php_files(dir) {
            let slug = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
            let result = self.load_any_file(&path, dir, slug.as_deref());
            report.record(path, result);
        }

        info!("Loaded {} must-use files", report.loaded.len());
        report
    }

    /// Loads the active plugins under `dir`, in the given order.
    ///
    /// Entries are either `slug/file.php` or a bare `slug`, whose entry file
    /// is found from its headers. In a native tree, each plugin's
    /// `bootstrap.php` is loaded instead.
    pub fn load_plugins(&self, dir: &Path, active: &[String]) -> LoadReport {
        let mut report = LoadReport::default();
        let native = self.is_native(dir);

        for entry in active {
            let slug = entry.split('/').next().unwrap_or(entry.as_str());
            let plugin_dir = dir.join(slug);

            let path = if native {
                Some(plugin_dir.join(NATIVE_PLUGIN_ENTRY))
            } else if entry.ends_with(".php") {
                Some(dir.join(entry))
            } else {
                find_entry_file(&plugin_dir).map(|(path, _)| path)
            };

            let Some(path) = path.filter(|p| p.is_file()) else {
                warn!("Active plugin '{}' has no entry file", entry);
                report
                    .failed
                    .push((plugin_dir, "entry file not found".to_string()));
                continue;
            };

            let result = self.load_any_file(&path, &plugin_dir, Some(slug));
            report.record(path, result);
        }

        info!("Loaded {} of {} active plugins", report.loaded.len(), active.len());
        report
    }

    /// Loads the theme `name` under `dir`: `Theme.php` in a native tree,
    /// `functions.php` otherwise. A theme without one loads nothing.
    pub fn load_theme(&self, dir: &Path, name: &str) -> LoadReport {
        let mut report = LoadReport::default();
        let theme_dir = dir.join(name);
        let entry = if self.is_native(dir) {
            NATIVE_THEME_ENTRY
        } else {
            LEGACY_THEME_ENTRY
        };

        let path = theme_dir.join(entry);
        if !path.is_file() {
            debug!("Theme '{}' has no {}", name, entry);
            return report;
        }

        let result = self.load_any_file(&path, &theme_dir, Some(name));
        report.record(path, result);
        report
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("content_dir", &self.content_dir)
            .field("interceptors", &self.interceptors.len())
            .field("allow_eval", &self.allow_eval)
            .finish_non_exhaustive()
    }
}

/// Canonical form of `path`. For a path that does not exist yet, the
/// deepest existing ancestor is canonicalized and the rest appended.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => normalize(parent).join(name),
        _ => path.to_path_buf(),
    }
}

fn php_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "php"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AutoloadInterceptor, ExecutorError, GlobalScope, HookCallback, HookRegistry, TransformerEngine,
    };
    use pretty_assertions::assert_eq;
    use tempfile::{TempDir, tempdir};
    use wpbridge_cache::{CompiledStorage, LocalMaterializer, MemoryBackend};
    use wpbridge_manifest::TransformerConfig;
    use wpbridge_transform::{TransformerFactory, TransformerRepository};

    /// Records executed units by their source text and registers a hook for
    /// every `add_action('<tag>')` it sees. Fails on `fail();`.
    #[derive(Default)]
    struct Script {
        seen: Mutex<Vec<String>>,
    }

    impl LegacyExecutor for Script {
        fn execute(&self, unit: LegacyUnit<'_>, scope: &mut GlobalScope) -> Result<(), ExecutorError> {
            let text = match unit {
                LegacyUnit::File(path) | LegacyUnit::Native(path) => {
                    fs::read_to_string(path).map_err(|e| ExecutorError::failed(&unit, e.to_string()))?
                }
                LegacyUnit::Source { code, .. } => code.to_string(),
            };
            self.seen.lock().push(text.clone());

            scope.set("current_user", "legacy");
            if let Some(rest) = text.split("add_action('").nth(1)
                && let Some((tag, _)) = rest.split_once('\'')
            {
                let callback: HookCallback = Arc::new(|_| GlobalValue::Null);
                scope.add_action(tag, callback, 10);
            }
            if text.contains("fail();") {
                return Err(ExecutorError::failed(&unit, "fatal error"));
            }
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        content: PathBuf,
        script: Arc<Script>,
        hooks: Arc<HookRegistry>,
        loader: ModuleLoader,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let content = dir.path().join("wp-content");
        fs::create_dir_all(&content).unwrap();

        let storage = Arc::new(CompiledStorage::new(
            Arc::new(MemoryBackend::new()),
            LocalMaterializer::new(dir.path().join("compiled")),
        ));
        let mut engine = TransformerEngine::new(TransformerRepository::new(), Some(storage));
        let mut config = TransformerConfig::new("fix", "replace", &["old_call"]);
        config.options = serde_json::json!({ "search": "old_call(", "replace": "new_call(" });
        engine.install(&[config], &TransformerFactory::default());

        let hooks = Arc::new(HookRegistry::new());
        let sandbox = Arc::new(IsolationSandbox::new(hooks.clone()));
        let script = Arc::new(Script::default());
        let loader = ModuleLoader::new(
            Arc::new(SharedEngine::new(engine)),
            sandbox,
            script.clone(),
            &content,
        );

        Fixture {
            dir,
            content,
            script,
            hooks,
            loader,
        }
    }

    fn write(path: &Path, text: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_native_versus_legacy() {
        let fx = fixture();
        assert!(fx.loader.is_native(&fx.dir.path().join("app/Kernel.php")));
        assert!(!fx.loader.is_native(&fx.content.join("plugins/a/a.php")));
    }

    #[test]
    fn test_legacy_file_is_transformed_sandboxed_and_hooks_promoted() {
        let fx = fixture();
        let file = fx.content.join("plugins/sample/sample.php");
        write(&file, "<?php old_call(); add_action('init');");
        fx.loader.sandbox().scope().set("current_user", "admin");

        assert!(fx.loader.load_any_file(&file, file.parent().unwrap(), Some("sample")).unwrap());

        assert_eq!(
            *fx.script.seen.lock(),
            vec!["<?php new_call(); add_action('init');".to_string()]
        );
        assert_eq!(fx.loader.sandbox().global("current_user"), Some(GlobalValue::from("admin")));
        assert!(fx.hooks.has_action("init"));
        assert!(fx.loader.sandbox().capture_hooks().is_empty());
    }

    #[test]
    fn test_native_file_runs_untransformed() {
        let fx = fixture();
        let file = fx.dir.path().join("app/bootstrap.php");
        write(&file, "<?php old_call();");

        assert!(fx.loader.load_any_file(&file, fx.dir.path(), None).unwrap());
        assert_eq!(*fx.script.seen.lock(), vec!["<?php old_call();".to_string()]);
        assert_eq!(fx.loader.sandbox().global("current_user"), Some(GlobalValue::from("legacy")));
    }

    #[test]
    fn test_files_load_once() {
        let fx = fixture();
        let file = fx.content.join("mu-plugins/one.php");
        write(&file, "<?php echo 1;");

        assert!(fx.loader.load_any_file(&file, &fx.content, None).unwrap());
        assert!(!fx.loader.load_any_file(&file, &fx.content, None).unwrap());
        assert_eq!(fx.script.seen.lock().len(), 1);
    }

    #[test]
    fn test_failure_restores_globals_and_drops_hooks() {
        let fx = fixture();
        let file = fx.content.join("plugins/broken/broken.php");
        write(&file, "<?php add_action('wp_head'); fail();");

        let err = fx.loader.load_sandboxed_file(&file, Some("broken")).unwrap_err();
        assert!(matches!(err, BridgeError::Executor(_)));
        assert_eq!(fx.loader.sandbox().global("current_user"), None);
        assert!(!fx.hooks.has_action("wp_head"));
        assert!(fx.loader.sandbox().capture_hooks().is_empty());
    }

    #[test]
    fn test_batch_order_and_per_file_failures() {
        let fx = fixture();
        write(&fx.content.join("mu-plugins/b.php"), "<?php echo 'mu-b';");
        write(&fx.content.join("mu-plugins/a.php"), "<?php echo 'mu-a';");
        write(&fx.content.join("mu-plugins/readme.txt"), "skip");
        write(
            &fx.content.join("plugins/alpha/alpha.php"),
            "<?php\n/* Plugin Name: Alpha\n * Version: 1.0 */\nfail();",
        );
        write(&fx.content.join("plugins/beta/main.php"), "<?php echo 'beta';");
        write(&fx.content.join("themes/classic/functions.php"), "<?php echo 'theme';");

        let mut report = fx.loader.load_mu_plugins(&fx.content.join("mu-plugins"));
        report.merge(fx.loader.load_plugins(
            &fx.content.join("plugins"),
            &["alpha".to_string(), "beta/main.php".to_string(), "gone".to_string()],
        ));
        report.merge(fx.loader.load_theme(&fx.content.join("themes"), "classic"));

        let names: Vec<String> = report
            .loaded
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.php", "b.php", "main.php", "functions.php"]);
        assert_eq!(report.failed.len(), 2);
        assert!(!report.is_success());
    }

    #[test]
    fn test_native_tree_uses_native_entries() {
        let fx = fixture();
        let native = fx.dir.path().join("modules");
        write(&native.join("plugins/shop/bootstrap.php"), "<?php // native shop");
        write(&native.join("themes/modern/Theme.php"), "<?php // native theme");
        write(&native.join("themes/modern/functions.php"), "<?php // ignored");

        let plugins = fx.loader.load_plugins(&native.join("plugins"), &["shop".to_string()]);
        let theme = fx.loader.load_theme(&native.join("themes"), "modern");

        assert_eq!(plugins.loaded, vec![native.join("plugins/shop/bootstrap.php")]);
        assert_eq!(theme.loaded, vec![native.join("themes/modern/Theme.php")]);
    }

    #[test]
    fn test_legacy_extension_is_registered_with_interceptors() {
        let fx = fixture();
        let plugin = fx.content.join("plugins/sample");
        write(&plugin.join("sample.php"), "<?php echo 1;");
        write(&plugin.join("src/Widget.php"), "<?php old_call();");

        let autoload = Arc::new(AutoloadInterceptor::new(
            Arc::new(SharedEngine::default()),
            fx.script.clone(),
        ));
        let loader = ModuleLoader::new(
            Arc::new(SharedEngine::default()),
            Arc::new(IsolationSandbox::new(fx.hooks.clone())),
            fx.script.clone(),
            &fx.content,
        )
        .with_interceptor(autoload.clone())
        .with_eval_fallback(true);

        assert!(loader.load_any_file(&plugin.join("sample.php"), &plugin, Some("sample")).unwrap());
        assert_eq!(autoload.roots(), vec![("sample".to_string(), plugin.clone())]);
    }
}
