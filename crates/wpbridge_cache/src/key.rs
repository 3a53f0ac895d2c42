//! Cache key derivation.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Hex digits kept from the BLAKE3 digest (128 bits).
const KEY_HEX_LEN: usize = 32;

/// Key for the current version of the file at `path`:
/// `hash(path + ":" + mtime)`.
pub fn cache_key(path: &Path) -> io::Result<String> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(cache_key_for(path, modified))
}

/// Key for `path` as of modification time `modified`.
///
/// The timestamp keeps nanoseconds so edits within the same second still
/// produce a new key.
pub fn cache_key_for(path: &Path, modified: SystemTime) -> String {
    let stamp = match modified.duration_since(UNIX_EPOCH) {
        Ok(since) => format!("{}.{:09}", since.as_secs(), since.subsec_nanos()),
        Err(before) => {
            let before = before.duration();
            format!("-{}.{:09}", before.as_secs(), before.subsec_nanos())
        }
    };
    truncated_hash(format!("{}:{}", path.display(), stamp).as_bytes())
}

fn truncated_hash(input: &[u8]) -> String {
    let hex = blake3::hash(input).to_hex();
    hex[..KEY_HEX_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_key_is_stable_and_sized() {
        let path = Path::new("/srv/wp-content/plugins/sample/sample.php");
        let mtime = UNIX_EPOCH + Duration::new(1_700_000_000, 5);

        let key = cache_key_for(path, mtime);
        assert_eq!(key.len(), KEY_HEX_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key_for(path, mtime));
    }

    #[test]
    fn test_key_changes_with_mtime_and_path() {
        let path = Path::new("/a.php");
        let t = UNIX_EPOCH + Duration::new(1_700_000_000, 0);

        let base = cache_key_for(path, t);
        assert_ne!(base, cache_key_for(path, t + Duration::from_nanos(1)));
        assert_ne!(base, cache_key_for(path, t + Duration::from_secs(1)));
        assert_ne!(base, cache_key_for(Path::new("/b.php"), t));
    }

    #[test]
    fn test_cache_key_reads_file_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.php");
        fs::write(&file, "<?php").unwrap();

        let key = cache_key(&file).unwrap();
        let mtime = fs::metadata(&file).unwrap().modified().unwrap();
        assert_eq!(key, cache_key_for(&file, mtime));
        assert!(cache_key(&dir.path().join("missing.php")).is_err());
    }
}
