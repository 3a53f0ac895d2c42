//! Extension manifest headers and installed-extension detection.
//!
//! An extension's entry point is any file whose first [`HEADER_SCAN_BYTES`]
//! bytes carry both a `Name:` and a `Version:` header line (labels are
//! case-insensitive, so `Plugin Name:` and `Theme Name:` both qualify). The
//! directory containing the entry point names the extension: that is its slug.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Number of leading bytes scanned for headers.
pub const HEADER_SCAN_BYTES: usize = 8192;

static NAME_HEADER: OnceLock<Regex> = OnceLock::new();
static VERSION_HEADER: OnceLock<Regex> = OnceLock::new();

fn name_header() -> &'static Regex {
    NAME_HEADER.get_or_init(|| {
        Regex::new(r"(?im)Name:[ \t]*([^\r\n]+)").expect("valid name header regex")
    })
}

fn version_header() -> &'static Regex {
    VERSION_HEADER.get_or_init(|| {
        Regex::new(r"(?im)(?:^|[^A-Za-z0-9_])Version:[ \t]*([^\r\n]+)")
            .expect("valid version header regex")
    })
}

/// Header fields recognised in an extension entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionHeaders {
    pub name: String,
    pub version: String,
}

/// An extension detected on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledExtension {
    /// Directory name of the extension.
    pub slug: String,
    /// Declared display name.
    pub name: String,
    /// Declared version.
    pub version: String,
    /// Extension root directory.
    pub path: PathBuf,
    /// File that carried the headers.
    pub entry_file: PathBuf,
}

/// Parses `Name:` / `Version:` headers out of a header block.
///
/// Returns `None` unless both fields are present and non-empty.
pub fn parse_headers(text: &str) -> Option<ExtensionHeaders> {
    let name = capture_value(name_header(), text)?;
    let version = capture_value(version_header(), text)?;
    Some(ExtensionHeaders { name, version })
}

fn capture_value(regex: &Regex, text: &str) -> Option<String> {
    let raw = regex.captures(text)?.get(1)?.as_str();
    let value = clean_header_value(raw);
    (!value.is_empty()).then_some(value)
}

/// Trims whitespace and a trailing comment or tag terminator.
fn clean_header_value(raw: &str) -> String {
    let mut value = raw.trim();
    for terminator in ["*/", "?>"] {
        if let Some(stripped) = value.strip_suffix(terminator) {
            value = stripped.trim_end();
        }
    }
    value.to_string()
}

/// Reads at most [`HEADER_SCAN_BYTES`] bytes of `path` as lossy UTF-8.
pub fn read_header_block(path: &Path) -> io::Result<String> {
    let mut buffer = Vec::with_capacity(HEADER_SCAN_BYTES);
    File::open(path)?
        .take(HEADER_SCAN_BYTES as u64)
        .read_to_end(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Finds the entry point of the extension rooted at `dir`.
///
/// Candidates are the directory's own `.php` files (in name order) followed
/// by `style.css`, which is where themes declare their headers.
pub fn find_entry_file(dir: &Path) -> Option<(PathBuf, ExtensionHeaders)> {
    let mut candidates: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "php"))
        .collect();

    let stylesheet = dir.join("style.css");
    if stylesheet.is_file() {
        candidates.push(stylesheet);
    }

    candidates.into_iter().find_map(|candidate| {
        let block = match read_header_block(&candidate) {
            Ok(block) => block,
            Err(e) => {
                debug!("Skipping unreadable file {}: {}", candidate.display(), e);
                return None;
            }
        };
        parse_headers(&block).map(|headers| (candidate, headers))
    })
}

/// Scans `root` for extension directories.
///
/// A missing or unreadable `root` yields no extensions. Directories without a
/// recognisable entry point are skipped.
pub fn detect_extensions(root: &Path) -> Vec<InstalledExtension> {
    if !root.is_dir() {
        debug!("Extension directory {} not found", root.display());
        return Vec::new();
    }

    let extensions: Vec<InstalledExtension> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|entry| {
            let dir = entry.into_path();
            let slug = dir.file_name()?.to_string_lossy().into_owned();
            match find_entry_file(&dir) {
                Some((entry_file, headers)) => Some(InstalledExtension {
                    slug,
                    name: headers.name,
                    version: headers.version,
                    path: dir,
                    entry_file,
                }),
                None => {
                    debug!("No manifest headers found in {}", dir.display());
                    None
                }
            }
        })
        .collect();

    info!(
        "Detected {} extensions in {}",
        extensions.len(),
        root.display()
    );
    extensions
}
