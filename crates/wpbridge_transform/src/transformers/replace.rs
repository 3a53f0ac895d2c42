//! Declarative fixups described entirely by options.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::{TransformError, Transformer};

const DECLARATIVE_PRIORITY: i32 = 100;

#[derive(Debug, Deserialize)]
struct ReplaceOptions {
    search: String,
    replace: String,
}

/// Literal search and replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceTransformer {
    search: String,
    replace: String,
}

impl ReplaceTransformer {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }

    /// Builds from `{ "search": ..., "replace": ... }`.
    pub fn from_options(id: &str, options: &Value) -> Result<Self, TransformError> {
        let options: ReplaceOptions = serde_json::from_value(options.clone())
            .map_err(|e| TransformError::invalid_options(id, e.to_string()))?;
        if options.search.is_empty() {
            return Err(TransformError::invalid_options(id, "'search' must not be empty"));
        }
        Ok(Self::new(options.search, options.replace))
    }
}

impl Transformer for ReplaceTransformer {
    fn priority(&self) -> i32 {
        DECLARATIVE_PRIORITY
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        Ok(source.replace(&self.search, &self.replace))
    }
}

#[derive(Debug, Deserialize)]
struct RegexOptions {
    pattern: String,
    replacement: String,
}

/// Regular-expression replacement. `$1`/`${name}` in the replacement refer
/// to capture groups.
#[derive(Debug, Clone)]
pub struct RegexTransformer {
    pattern: Regex,
    replacement: String,
}

impl RegexTransformer {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, TransformError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    /// Builds from `{ "pattern": ..., "replacement": ... }`.
    pub fn from_options(id: &str, options: &Value) -> Result<Self, TransformError> {
        let options: RegexOptions = serde_json::from_value(options.clone())
            .map_err(|e| TransformError::invalid_options(id, e.to_string()))?;
        Self::new(&options.pattern, options.replacement)
    }
}

impl Transformer for RegexTransformer {
    fn priority(&self) -> i32 {
        DECLARATIVE_PRIORITY
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        Ok(self
            .pattern
            .replace_all(source, self.replacement.as_str())
            .into_owned())
    }
}
