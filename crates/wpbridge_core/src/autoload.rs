//! Class-load interception.
//!
//! The interceptor sits first in the class resolver chain. For a requested
//! class it probes every transformable extension root under the usual
//! sub-directory conventions and, on the first hit, loads the compiled
//! artifact instead of the original file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{BridgeError, ContextFactory, GlobalScope, LegacyExecutor, SharedEngine};

/// Sub-directories probed under each extension root, in order. The empty
/// entry is the root itself.
pub const CLASS_SUBDIRS: [&str; 4] = ["src", "includes", "", "lib"];

/// Something that can be told about extensions whose files must be
/// transformed when loaded.
pub trait Interceptor: Send + Sync {
    /// Starts intercepting loads below `root` for extension `slug`.
    fn watch_extension(&self, slug: &str, root: &Path);
}

/// A class resolver. Returns `Ok(true)` when it loaded the class.
pub trait ClassResolver: Send + Sync {
    fn resolve_class(&self, class: &str, scope: &mut GlobalScope) -> Result<bool, BridgeError>;
}

/// Ordered list of class resolvers, tried until one succeeds.
#[derive(Default)]
pub struct ClassResolverChain {
    resolvers: Vec<Arc<dyn ClassResolver>>,
}

impl ClassResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resolver tried before all current ones.
    pub fn prepend(&mut self, resolver: Arc<dyn ClassResolver>) {
        self.resolvers.insert(0, resolver);
    }

    /// Adds a resolver tried after all current ones.
    pub fn push(&mut self, resolver: Arc<dyn ClassResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Tries each resolver in order. The first error stops the chain.
    pub fn resolve(&self, class: &str, scope: &mut GlobalScope) -> Result<bool, BridgeError> {
        for resolver in &self.resolvers {
            if resolver.resolve_class(class, scope)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for ClassResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassResolverChain")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

/// Maps a class name to its relative file path:
/// `Vendor\Package\Order` becomes `Vendor/Package/Order.php`.
pub fn class_to_file(class: &str) -> PathBuf {
    let relative = class.trim_start_matches('\\').replace('\\', "/");
    PathBuf::from(format!("{relative}.php"))
}

/// Class-load interceptor over a set of transformable extension roots.
pub struct AutoloadInterceptor {
    engine: Arc<SharedEngine>,
    executor: Arc<dyn LegacyExecutor>,
    contexts: ContextFactory,
    roots: RwLock<Vec<(String, PathBuf)>>,
    loaded: Mutex<HashSet<PathBuf>>,
    allow_eval: bool,
}

impl AutoloadInterceptor {
    pub fn new(engine: Arc<SharedEngine>, executor: Arc<dyn LegacyExecutor>) -> Self {
        Self {
            engine,
            executor,
            contexts: ContextFactory::default(),
            roots: RwLock::new(Vec::new()),
            loaded: Mutex::new(HashSet::new()),
            allow_eval: false,
        }
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

    /// Registers `root` as the root of extension `slug`. Registering a slug
    /// again replaces its root.
    pub fn add_transformable_extension(&self, slug: impl Into<String>, root: impl Into<PathBuf>) {
        let slug = slug.into();
        let root = root.into();
        let mut roots = self.roots.write();
        match roots.iter_mut().find(|(existing, _)| *existing == slug) {
            Some(entry) => entry.1 = root,
            None => {
                debug!("Intercepting class loads of {} under {}", slug, root.display());
                roots.push((slug, root));
            }
        }
    }

    /// Registers every extension under `base`: each sub-directory is an
    /// extension of that name, and each single-file `.php` extension is
    /// rooted at `base` itself.
    pub fn add_transformable_directory(&self, base: &Path) -> usize {
        let mut added = 0;
        for entry in WalkDir::new(base)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let slug = if entry.file_type().is_dir() {
                entry.file_name().to_string_lossy().into_owned()
            } else if path.extension().is_some_and(|ext| ext == "php") {
                match path.file_stem() {
                    Some(stem) => stem.to_string_lossy().into_owned(),
                    None => continue,
                }
            } else {
                continue;
            };

            let root = if entry.file_type().is_dir() {
                path.to_path_buf()
            } else {
                base.to_path_buf()
            };
            self.add_transformable_extension(slug, root);
            added += 1;
        }

        info!("Registered {} transformable extensions under {}", added, base.display());
        added
    }

    /// Registered `(slug, root)` pairs in probe order.
    pub fn roots(&self) -> Vec<(String, PathBuf)> {
        self.roots.read().clone()
    }

    /// First existing file for `class` across all roots, with the slug of
    /// the extension that owns it.
    pub fn find_class_file(&self, class: &str) -> Option<(String, PathBuf)> {
        let relative = class_to_file(class);
        let roots = self.roots.read();
        roots.iter().find_map(|(slug, root)| {
            CLASS_SUBDIRS.iter().find_map(|subdir| {
                let candidate = if subdir.is_empty() {
                    root.join(&relative)
                } else {
                    root.join(subdir).join(&relative)
                };
                candidate.is_file().then(|| (slug.clone(), candidate))
            })
        })
    }

    /// Loads the transformed file defining `class`.
    ///
    /// Returns `Ok(false)` when no transformable extension has a matching
    /// file, so other resolvers can try. A file is executed at most once.
    pub fn autoload(&self, class: &str, scope: &mut GlobalScope) -> Result<bool, BridgeError> {
        let Some((slug, path)) = self.find_class_file(class) else {
            return Ok(false);
        };

        if !self.loaded.lock().insert(path.clone()) {
            debug!("{} already loaded for {}", path.display(), class);
            return Ok(true);
        }

        debug!("Autoloading {} from {}", class, path.display());
        let context = self.contexts.for_file(&path, Some(&slug));
        let compiled = self.engine.current().compile_file(&path, &context)?;
        self.executor
            .execute(compiled.as_unit(&path, self.allow_eval)?, scope)?;
        Ok(true)
    }
}

impl ClassResolver for AutoloadInterceptor {
    fn resolve_class(&self, class: &str, scope: &mut GlobalScope) -> Result<bool, BridgeError> {
        self.autoload(class, scope)
    }
}

impl Interceptor for AutoloadInterceptor {
    fn watch_extension(&self, slug: &str, root: &Path) {
        self.add_transformable_extension(slug, root);
    }
}

impl std::fmt::Debug for AutoloadInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoloadInterceptor")
            .field("roots", &*self.roots.read())
            .field("allow_eval", &self.allow_eval)
            .finish_non_exhaustive()
    }
}
