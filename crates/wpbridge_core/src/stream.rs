//! Stream-protocol interception.
//!
//! Each transformable extension gets a URI scheme mapping a virtual root to
//! its real directory. Opening a `.php` file through the scheme yields the
//! transformed source from memory; every other file, and every metadata
//! query, goes to the real filesystem.

use std::collections::HashMap;
use std::fs::{self, File, Metadata};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{BridgeError, ContextFactory, Interceptor, SharedEngine};

/// Prefix of the scheme registered for each watched extension.
pub const PROTOCOL_PREFIX: &str = "wpbridge-";

/// Scheme registered for extension `slug` by
/// [`Interceptor::watch_extension`]. Distinct slugs can share a scheme
/// (`My_Plugin` and `my-plugin`); the first one watched keeps it.
pub fn protocol_for(slug: &str) -> String {
    let sanitized: String = slug
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("{PROTOCOL_PREFIX}{sanitized}")
}

fn is_valid_protocol(protocol: &str) -> bool {
    let mut chars = protocol.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[derive(Debug, Clone)]
struct Mount {
    root: PathBuf,
    slug: Option<String>,
}

/// An opened stream.
#[derive(Debug)]
pub enum StreamHandle {
    /// Transformed source served from memory.
    Transformed(Cursor<Vec<u8>>),
    /// The real file, untouched.
    Passthrough(File),
}

impl StreamHandle {
    pub fn is_transformed(&self) -> bool {
        matches!(self, Self::Transformed(_))
    }
}

impl Read for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Transformed(cursor) => cursor.read(buf),
            Self::Passthrough(file) => file.read(buf),
        }
    }
}

impl Seek for StreamHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Transformed(cursor) => cursor.seek(pos),
            Self::Passthrough(file) => file.seek(pos),
        }
    }
}

/// Serves transformed sources through per-extension URI schemes.
pub struct StreamInterceptor {
    engine: Arc<SharedEngine>,
    contexts: ContextFactory,
    mounts: RwLock<HashMap<String, Mount>>,
}

impl StreamInterceptor {
    pub fn new(engine: Arc<SharedEngine>) -> Self {
        Self {
            engine,
            contexts: ContextFactory::default(),
            mounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_contexts(mut self, contexts: ContextFactory) -> Self {
        self.contexts = contexts;
        self
    }

    /// Maps `protocol://` to `root`. Re-registering a protocol replaces its
    /// root.
    pub fn register(&self, protocol: &str, root: impl Into<PathBuf>) -> Result<(), BridgeError> {
        self.mount(protocol, root.into(), None)
    }

    fn mount(&self, protocol: &str, root: PathBuf, slug: Option<String>) -> Result<(), BridgeError> {
        if !is_valid_protocol(protocol) {
            return Err(BridgeError::config(format!("Invalid stream protocol '{protocol}'")));
        }
        let mut mounts = self.mounts.write();
        if let Some(watched) = &slug
            && let Some(existing) = mounts.get(protocol)
            && existing.root != root
        {
            warn!(
                "{}:// already serves {}; not mounting {} for {}",
                protocol,
                existing.root.display(),
                root.display(),
                watched
            );
            return Ok(());
        }
        debug!("Registered {}:// for {}", protocol, root.display());
        mounts.insert(protocol.to_string(), Mount { root, slug });
        Ok(())
    }

    pub fn is_registered(&self, protocol: &str) -> bool {
        self.mounts.read().contains_key(protocol)
    }

    /// Registered protocols, sorted.
    pub fn protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self.mounts.read().keys().cloned().collect();
        protocols.sort_unstable();
        protocols
    }

    /// Real path behind `uri`.
    ///
    /// Returns `None` for an unregistered scheme, a URI without `://`, or a
    /// relative part that would climb out of the root.
    pub fn resolve_path(&self, uri: &str) -> Option<PathBuf> {
        self.resolve(uri).map(|(path, _)| path)
    }

    fn resolve(&self, uri: &str) -> Option<(PathBuf, Option<String>)> {
        let (protocol, relative) = uri.split_once("://")?;
        let mounts = self.mounts.read();
        let mount = mounts.get(protocol)?;

        // Only normal segments are kept so `./a.php` and `a.php` share a
        // cache key.
        let mut path = mount.root.clone();
        for component in Path::new(relative.trim_start_matches('/')).components() {
            match component {
                Component::Normal(segment) => path.push(segment),
                Component::CurDir => {}
                _ => {
                    debug!("Rejecting {}: path leaves the stream root", uri);
                    return None;
                }
            }
        }
        Some((path, mount.slug.clone()))
    }

    /// Opens `uri`. `.php` files are served transformed, anything else as
    /// is.
    pub fn open(&self, uri: &str) -> Result<StreamHandle, BridgeError> {
        let (path, slug) = self.resolve(uri).ok_or_else(|| not_found(uri))?;

        if path.extension().is_some_and(|ext| ext == "php") {
            let context = self.contexts.for_file(&path, slug.as_deref());
            let compiled = self.engine.current().compile_file_source(&path, &context)?;
            return Ok(StreamHandle::Transformed(Cursor::new(compiled.into_bytes())));
        }

        Ok(StreamHandle::Passthrough(File::open(&path)?))
    }

    /// Metadata of the real file behind `uri`.
    pub fn url_stat(&self, uri: &str) -> Result<Metadata, BridgeError> {
        let path = self.resolve_path(uri).ok_or_else(|| not_found(uri))?;
        Ok(fs::metadata(path)?)
    }
}

fn not_found(uri: &str) -> BridgeError {
    BridgeError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("No stream root registered for {uri}"),
    ))
}

impl Interceptor for StreamInterceptor {
    fn watch_extension(&self, slug: &str, root: &Path) {
        let protocol = protocol_for(slug);
        if let Err(e) = self.mount(&protocol, root.to_path_buf(), Some(slug.to_string())) {
            debug!("Not intercepting {}: {}", slug, e);
        }
    }
}

impl std::fmt::Debug for StreamInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamInterceptor")
            .field("protocols", &self.protocols())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransformerEngine;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::tempdir;
    use wpbridge_cache::{CompiledStorage, LocalMaterializer, MemoryBackend, cache_key};
    use wpbridge_manifest::TransformerConfig;
    use wpbridge_transform::{TransformerFactory, TransformerRepository};

    fn interceptor(compiled_dir: &Path) -> (StreamInterceptor, Arc<CompiledStorage>) {
        let storage = Arc::new(CompiledStorage::new(
            Arc::new(MemoryBackend::new()),
            LocalMaterializer::new(compiled_dir),
        ));
        let mut engine = TransformerEngine::new(TransformerRepository::new(), Some(storage.clone()));
        let mut config = TransformerConfig::new("fix", "replace", &["old_call"]);
        config.options = serde_json::json!({ "search": "old_call(", "replace": "new_call(" });
        engine.install(&[config], &TransformerFactory::default());
        (StreamInterceptor::new(Arc::new(SharedEngine::new(engine))), storage)
    }

    fn read_all(mut handle: StreamHandle) -> String {
        let mut text = String::new();
        handle.read_to_string(&mut text).unwrap();
        text
    }

    #[rstest]
    #[case("wpbridge-sample", true)]
    #[case("legacy+v1.x", true)]
    #[case("1legacy", false)]
    #[case("bad/proto", false)]
    #[case("", false)]
    fn test_protocol_validation(#[case] protocol: &str, #[case] valid: bool) {
        assert_eq!(is_valid_protocol(protocol), valid);
    }

    #[test]
    fn test_protocol_for_slug() {
        assert_eq!(protocol_for("My_Plugin"), "wpbridge-my-plugin");
    }

    #[test]
    fn test_resolve_path() {
        let dir = tempdir().unwrap();
        let (streams, _) = interceptor(&dir.path().join("compiled"));
        streams.register("legacy", dir.path()).unwrap();

        assert_eq!(
            streams.resolve_path("legacy://inc/a.php"),
            Some(dir.path().join("inc/a.php"))
        );
        assert_eq!(streams.resolve_path("legacy:///a.php"), Some(dir.path().join("a.php")));
        assert_eq!(streams.resolve_path("legacy://../etc/passwd"), None);
        assert_eq!(streams.resolve_path("other://a.php"), None);
        assert_eq!(streams.resolve_path("a.php"), None);
    }

    #[test]
    fn test_open_transforms_php_only() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("sample");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.php"), "<?php old_call();").unwrap();
        fs::write(root.join("notes.txt"), "old_call();").unwrap();

        let (streams, storage) = interceptor(&dir.path().join("compiled"));
        streams.watch_extension("sample", &root);

        let php = streams.open("wpbridge-sample://a.php").unwrap();
        assert!(php.is_transformed());
        assert_eq!(read_all(php), "<?php new_call();");

        let key = cache_key(&root.join("a.php")).unwrap();
        assert!(storage.has(&key).unwrap());

        let text = streams.open("wpbridge-sample://notes.txt").unwrap();
        assert!(!text.is_transformed());
        assert_eq!(read_all(text), "old_call();");
    }

    #[test]
    fn test_current_dir_segments_share_one_artifact() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("sample");
        fs::create_dir_all(root.join("inc")).unwrap();
        fs::write(root.join("inc/a.php"), "<?php old_call();").unwrap();

        let compiled = dir.path().join("compiled");
        let (streams, storage) = interceptor(&compiled);
        streams.register("legacy", &root).unwrap();

        assert_eq!(
            streams.resolve_path("legacy://./inc/./a.php"),
            streams.resolve_path("legacy://inc/a.php")
        );
        assert_eq!(streams.resolve_path("legacy://./inc/a.php"), Some(root.join("inc/a.php")));

        for uri in ["legacy://./inc/a.php", "legacy://inc/a.php", "legacy:///inc/./a.php"] {
            assert_eq!(read_all(streams.open(uri).unwrap()), "<?php new_call();");
        }

        let key = cache_key(&root.join("inc/a.php")).unwrap();
        assert!(storage.has(&key).unwrap());
        assert_eq!(fs::read_dir(&compiled).unwrap().count(), 1);
    }

    #[test]
    fn test_colliding_slugs_keep_first_mount() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("My_Plugin");
        let second = dir.path().join("my-plugin");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        let (streams, _) = interceptor(&dir.path().join("compiled"));
        streams.watch_extension("My_Plugin", &first);
        streams.watch_extension("my-plugin", &second);

        assert_eq!(protocol_for("my-plugin"), protocol_for("My_Plugin"));
        assert_eq!(streams.protocols(), vec!["wpbridge-my-plugin".to_string()]);
        assert_eq!(
            streams.resolve_path("wpbridge-my-plugin://a.php"),
            Some(first.join("a.php"))
        );

        // Watching the same root again is not a collision.
        streams.watch_extension("My_Plugin", &first);
        assert_eq!(
            streams.resolve_path("wpbridge-my-plugin://a.php"),
            Some(first.join("a.php"))
        );
    }

    #[test]
    fn test_register_replaces_root() {
        let dir = tempdir().unwrap();
        let (streams, _) = interceptor(&dir.path().join("compiled"));
        streams.register("legacy", dir.path().join("one")).unwrap();
        streams.register("legacy", dir.path().join("two")).unwrap();
        assert_eq!(streams.resolve_path("legacy://a.php"), Some(dir.path().join("two/a.php")));
    }

    #[test]
    fn test_url_stat_reports_real_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.php"), "<?php old_call();").unwrap();
        let (streams, _) = interceptor(&dir.path().join("compiled"));
        streams.register("legacy", dir.path()).unwrap();

        let metadata = streams.url_stat("legacy://a.php").unwrap();
        assert_eq!(metadata.len(), "<?php old_call();".len() as u64);

        assert!(matches!(streams.url_stat("legacy://missing.php"), Err(BridgeError::Io(_))));
        assert!(matches!(streams.open("nope://a.php"), Err(BridgeError::Io(_))));
    }
}
