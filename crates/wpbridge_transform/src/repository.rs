//! In-memory transformer registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::Transformer;

/// Supplies transformers the repository has not seen yet.
///
/// Consulted on a lookup miss; a returned transformer is cached in the
/// repository.
pub trait TransformerSource: Send + Sync {
    fn load(&self, id: &str) -> Option<Arc<dyn Transformer>>;
}

impl<F> TransformerSource for F
where
    F: Fn(&str) -> Option<Arc<dyn Transformer>> + Send + Sync,
{
    fn load(&self, id: &str) -> Option<Arc<dyn Transformer>> {
        self(id)
    }
}

#[derive(Clone)]
struct Entry {
    transformer: Arc<dyn Transformer>,
    tags: Vec<String>,
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, Entry>,
    /// Registration order of ids.
    order: Vec<String>,
}

/// Maps transformer ids to shared transformer instances.
#[derive(Default)]
pub struct TransformerRepository {
    entries: RwLock<Entries>,
    source: Option<Box<dyn TransformerSource>>,
}

impl TransformerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository that falls back to `source` on lookup misses.
    pub fn with_source(source: impl TransformerSource + 'static) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            source: Some(Box::new(source)),
        }
    }

    /// Inserts or replaces the global (untagged) transformer `id`.
    pub fn register(&self, id: impl Into<String>, transformer: Arc<dyn Transformer>) {
        self.register_tagged(id, transformer, Vec::new());
    }

    /// Inserts or replaces transformer `id` under context `tags`.
    ///
    /// A replaced entry keeps its original registration position.
    pub fn register_tagged(
        &self,
        id: impl Into<String>,
        transformer: Arc<dyn Transformer>,
        tags: Vec<String>,
    ) {
        let id = id.into();
        let mut entries = self.entries.write();
        let entry = Entry { transformer, tags };
        if entries.by_id.insert(id.clone(), entry).is_none() {
            entries.order.push(id);
        }
    }

    /// Looks up transformer `id`. A miss is not an error.
    pub fn load(&self, id: &str) -> Option<Arc<dyn Transformer>> {
        if let Some(entry) = self.entries.read().by_id.get(id) {
            return Some(Arc::clone(&entry.transformer));
        }

        let transformer = self.source.as_ref()?.load(id)?;
        debug!("Lazily loaded transformer '{}'", id);
        self.register(id, Arc::clone(&transformer));
        Some(transformer)
    }

    /// Returns the untagged transformers plus those tagged `tag`, highest
    /// priority first. Ties keep registration order.
    pub fn get_for_context(&self, tag: &str) -> Vec<Arc<dyn Transformer>> {
        let entries = self.entries.read();
        let mut matching: Vec<Arc<dyn Transformer>> = entries
            .order
            .iter()
            .filter_map(|id| entries.by_id.get(id))
            .filter(|entry| entry.tags.is_empty() || entry.tags.iter().any(|t| t == tag))
            .map(|entry| Arc::clone(&entry.transformer))
            .collect();
        matching.sort_by_key(|t| std::cmp::Reverse(t.priority()));
        matching
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().by_id.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TransformerRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerRepository")
            .field("ids", &self.ids())
            .field("lazy", &self.source.is_some())
            .finish()
    }
}
