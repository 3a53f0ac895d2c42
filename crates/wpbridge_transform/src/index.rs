//! Keyword to transformer lookup.

use std::collections::{HashMap, HashSet};

use crate::lexer::for_each_token;

/// Maps literal keywords to the ids of the transformers interested in them.
///
/// Selection scans the source once and looks every token up in a hash map,
/// so its cost does not grow with the number of registered transformers.
#[derive(Debug, Clone, Default)]
pub struct PatternIndex {
    keywords: HashMap<String, Vec<String>>,
}

impl PatternIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` under each of `keywords`. Keywords accumulate across
    /// calls; indexing the same pair twice has no further effect.
    pub fn index_transformer<I, S>(&mut self, id: &str, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            let ids = self.keywords.entry(keyword.as_ref().to_string()).or_default();
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
    }

    /// Returns the ids whose keywords occur as tokens in `source`,
    /// deduplicated, in order of first occurrence.
    pub fn relevant_ids(&self, source: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut relevant = Vec::new();

        if self.keywords.is_empty() {
            return relevant;
        }

        for_each_token(source, |token| {
            if let Some(ids) = self.keywords.get(token) {
                for id in ids {
                    if seen.insert(id.as_str()) {
                        relevant.push(id.as_str());
                    }
                }
            }
        });

        relevant
    }

    /// Ids registered under `keyword`.
    pub fn ids_for(&self, keyword: &str) -> &[String] {
        self.keywords.get(keyword).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct keywords.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
