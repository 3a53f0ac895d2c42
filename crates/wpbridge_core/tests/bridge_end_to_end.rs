//! End-to-end loading of a legacy site through a fully wired bridge.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tempfile::{TempDir, tempdir};
use wpbridge_cache::cache_key;
use wpbridge_core::{
    Bridge, BridgeConfig, BridgeError, CacheBackendKind, ExecutorError, GlobalScope, GlobalValue,
    HookCallback, HookRegistry, InterceptionMode, LegacyExecutor, LegacyUnit, extension_tag,
};
use wpbridge_transform::Context;

type Seen = Arc<Mutex<Vec<(PathBuf, String)>>>;

fn executor<F>(f: F) -> Arc<dyn LegacyExecutor>
where
    F: Fn(LegacyUnit<'_>, &mut GlobalScope) -> Result<(), ExecutorError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Reads each executed unit and registers an `init` action when the code
/// mentions `add_action`.
fn recording_executor(seen: Seen) -> Arc<dyn LegacyExecutor> {
    executor(move |unit, scope| {
        let text = match unit {
            LegacyUnit::File(path) | LegacyUnit::Native(path) => {
                fs::read_to_string(path).map_err(|e| ExecutorError::failed(&unit, e.to_string()))?
            }
            LegacyUnit::Source { code, .. } => code.to_string(),
        };
        if text.contains("add_action") {
            let callback: HookCallback = Arc::new(|_| GlobalValue::Null);
            scope.add_action("init", callback, 10);
        }
        seen.lock().push((unit.origin().to_path_buf(), text));
        Ok(())
    })
}

struct Site {
    dir: TempDir,
}

impl Site {
    fn new() -> Self {
        let site = Self { dir: tempdir().unwrap() };
        site.write(
            "wp-content/plugins/sample/sample.php",
            "<?php\n/*\n * Plugin Name: Sample\n * Version: 2.0\n */\nold_call();\nadd_action('init', 'sample_init');\n",
        );
        site.write(
            "config/registry.json",
            r#"{ "transformers": [
                { "plugin_slug": "sample", "transformer_id": "sample_fix", "type": "replace",
                  "keywords": ["old_call"], "version_constraint": ">=1.0",
                  "options": { "search": "old_call(", "replace": "new_call(" } }
            ] }"#,
        );
        site
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn write(&self, relative: &str, text: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::new();
        config.content_dir = self.path("wp-content");
        config.config_dir = Some(self.path("config"));
        config.active_plugins = vec!["sample".to_string()];
        config.cache.backend = CacheBackendKind::Memory;
        config.cache.materialize_dir = Some(self.path("compiled"));
        config
    }

    fn entry(&self) -> PathBuf {
        self.path("wp-content/plugins/sample/sample.php")
    }
}

#[test]
fn sample_plugin_is_transformed_cached_and_its_hooks_promoted() {
    let site = Site::new();
    let seen: Seen = Arc::default();
    let hooks = Arc::new(HookRegistry::new());
    let bridge = Bridge::with_hooks(site.config(), recording_executor(seen.clone()), hooks.clone()).unwrap();

    assert_eq!(bridge.extensions().len(), 1);
    assert_eq!(bridge.extensions()[0].version, "2.0");
    assert_eq!(
        bridge.engine().repository().get_for_context(&extension_tag("sample")).len(),
        1
    );

    let report = bridge.boot();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.loaded, vec![site.entry()]);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1.contains("new_call();"));
    assert!(!seen[0].1.contains("old_call();"));

    let key = cache_key(&site.entry()).unwrap();
    let storage = bridge.storage().unwrap();
    let cached = storage.get(&key).unwrap().unwrap();
    assert_eq!(cached, seen[0].1);
    assert_eq!(fs::read_to_string(storage.get_path(&key).unwrap()).unwrap(), cached);

    assert!(hooks.has_action("init"));
    assert!(bridge.sandbox().capture_hooks().is_empty());
}

#[test]
fn changing_mtime_changes_the_key_and_recompiles() {
    let site = Site::new();
    let bridge = Bridge::new(site.config(), recording_executor(Seen::default())).unwrap();
    let engine = bridge.engine();
    let context = Context::for_extension(site.entry(), "sample", "2.0");

    engine.compile_file(&site.entry(), &context).unwrap();
    let first = cache_key(&site.entry()).unwrap();

    site.write("wp-content/plugins/sample/sample.php", "<?php old_call(2);");
    let later = SystemTime::now() + Duration::from_secs(5);
    File::options()
        .write(true)
        .open(site.entry())
        .unwrap()
        .set_modified(later)
        .unwrap();

    let second = cache_key(&site.entry()).unwrap();
    assert_ne!(first, second);

    let compiled = engine.compile_file_source(&site.entry(), &context).unwrap();
    assert_eq!(compiled, "<?php new_call(2);");
    assert!(bridge.storage().unwrap().has(&first).unwrap());
    assert!(bridge.storage().unwrap().has(&second).unwrap());
}

#[test]
fn registry_constraint_excludes_old_versions() {
    let site = Site::new();
    site.write(
        "wp-content/plugins/sample/sample.php",
        "<?php\n/*\n * Plugin Name: Sample\n * Version: 0.9\n */\nold_call();\n",
    );
    let seen: Seen = Arc::default();
    let bridge = Bridge::new(site.config(), recording_executor(seen.clone())).unwrap();

    assert!(bridge.boot().is_success());
    assert!(seen.lock()[0].1.contains("old_call();"));
}

#[test]
fn user_configuration_can_disable_registry_transformer() {
    let site = Site::new();
    site.write(
        "config/transformers.jsonc",
        r#"{ "transformers": [ { "id": "sample_fix", "enabled": false } ] }"#,
    );
    let seen: Seen = Arc::default();
    let bridge = Bridge::new(site.config(), recording_executor(seen.clone())).unwrap();

    bridge.boot();
    assert!(seen.lock()[0].1.contains("old_call();"));
}

#[test]
fn reload_swaps_in_rediscovered_transformers() {
    let site = Site::new();
    let bridge = Bridge::new(site.config(), recording_executor(Seen::default())).unwrap();
    let before = bridge.engine();
    assert!(before.repository().contains("sample_fix"));

    site.write(
        "config/transformers.json",
        r#"{ "transformers": [ { "id": "sample_fix", "enabled": false } ] }"#,
    );
    bridge.reload().unwrap();

    assert!(!bridge.engine().repository().contains("sample_fix"));
    assert!(before.repository().contains("sample_fix"));
}

#[test]
fn stream_mode_serves_transformed_sources() {
    let site = Site::new();
    site.write("wp-content/plugins/sample/assets/app.js", "old_call();");
    let mut config = site.config();
    config.interception = InterceptionMode::Stream;
    let bridge = Bridge::new(config, recording_executor(Seen::default())).unwrap();
    assert!(bridge.autoload().is_none());

    bridge.watch_extensions();
    let streams = bridge.streams().unwrap();

    let mut php = String::new();
    streams
        .open("wpbridge-sample://sample.php")
        .unwrap()
        .read_to_string(&mut php)
        .unwrap();
    assert!(php.contains("new_call();"));

    let mut js = String::new();
    streams
        .open("wpbridge-sample://assets/app.js")
        .unwrap()
        .read_to_string(&mut js)
        .unwrap();
    assert_eq!(js, "old_call();");
}

#[test]
fn autoload_mode_resolves_classes_of_installed_extensions() {
    let site = Site::new();
    site.write("wp-content/plugins/sample/includes/Sample/Widget.php", "<?php old_call();");
    let seen: Seen = Arc::default();
    let bridge = Bridge::new(site.config(), recording_executor(seen.clone())).unwrap();
    bridge.watch_extensions();

    let mut scope = GlobalScope::new();
    assert!(bridge.autoload_class("Sample\\Widget", &mut scope).unwrap());
    assert!(!bridge.autoload_class("Sample\\Missing", &mut scope).unwrap());

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1, "<?php new_call();");
}

#[test]
fn missing_storage_requires_eval_opt_in() {
    let site = Site::new();
    let mut config = site.config();
    config.cache.backend = CacheBackendKind::None;
    assert!(matches!(
        Bridge::new(config.clone(), recording_executor(Seen::default())),
        Err(BridgeError::Config(_))
    ));

    config.allow_eval_fallback = true;
    let seen: Seen = Arc::default();
    let bridge = Bridge::new(config, recording_executor(seen.clone())).unwrap();
    assert!(bridge.boot().is_success());
    assert!(seen.lock()[0].1.contains("new_call();"));
    assert!(bridge.warm().is_err());
}

#[test]
fn warm_compiles_every_extension_file() {
    let site = Site::new();
    site.write("wp-content/plugins/sample/includes/extra.php", "<?php old_call();");
    let bridge = Bridge::new(site.config(), recording_executor(Seen::default())).unwrap();

    let (compiled, failures) = bridge.warm().unwrap();
    assert_eq!(compiled, 2);
    assert!(failures.is_empty());

    let key = cache_key(&site.path("wp-content/plugins/sample/includes/extra.php")).unwrap();
    assert_eq!(
        bridge.storage().unwrap().get(&key).unwrap().as_deref(),
        Some("<?php new_call();")
    );
}

#[test]
fn config_file_paths_resolve_against_its_directory() {
    let site = Site::new();
    site.write(
        "bridge.jsonc",
        r#"{
            // everything relative to this file
            "content_dir": "wp-content",
            "config_dir": "config",
            "active_plugins": ["sample"],
            "cache": { "backend": "memory", "materialize_dir": "compiled" }
        }"#,
    );
    let path = BridgeConfig::discover(site.dir.path()).unwrap();
    let config = BridgeConfig::from_file(&path).unwrap();
    let bridge = Bridge::new(config, recording_executor(Seen::default())).unwrap();

    assert_eq!(bridge.boot().loaded, vec![site.entry()]);
    assert!(Path::new(&site.path("compiled")).is_dir());
}
