//! Transformer abstraction.

use std::sync::Arc;

use crate::{Requirement, TransformError};

/// A rewrite rule over legacy source text.
///
/// Implementations are registered once at startup and shared read-only by
/// every compilation, so they must not depend on how many times they run.
pub trait Transformer: Send + Sync {
    /// Ordering weight. Higher runs first.
    fn priority(&self) -> i32;

    /// Conditions that must all hold for this transformer to run.
    fn requirements(&self) -> &[Arc<dyn Requirement>] {
        &[]
    }

    /// Rewrites `source`.
    fn transform(&self, source: &str) -> Result<String, TransformError>;
}

/// A transformer built from a declaration: the declared priority (if any)
/// replaces the intrinsic one, and declared requirements are appended to
/// the intrinsic ones.
pub struct DeclaredTransformer {
    inner: Box<dyn Transformer>,
    priority: i32,
    requirements: Vec<Arc<dyn Requirement>>,
}

impl DeclaredTransformer {
    pub fn new(
        inner: Box<dyn Transformer>,
        priority: Option<i32>,
        declared: Vec<Arc<dyn Requirement>>,
    ) -> Self {
        let priority = priority.unwrap_or_else(|| inner.priority());
        let mut requirements = inner.requirements().to_vec();
        requirements.extend(declared);
        Self {
            inner,
            priority,
            requirements,
        }
    }
}

impl Transformer for DeclaredTransformer {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn requirements(&self) -> &[Arc<dyn Requirement>] {
        &self.requirements
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        self.inner.transform(source)
    }
}
