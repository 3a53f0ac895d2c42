//! Type name to transformer constructor table.
//!
//! Declarations name their implementing type as a string. Only names
//! registered here can be instantiated; anything else is rejected.

use std::collections::HashMap;
use std::sync::Arc;

use wpbridge_manifest::TransformerConfig;

use crate::transformers::{
    GlobalToContainerTransformer, GlobalVariableTransformer, OutputBufferTransformer,
    RegexTransformer, ReplaceTransformer, WooCommerceOrderTransformer, WpOptionsTransformer,
    WpdbDirectQueryTransformer,
};
use crate::{DeclaredTransformer, ExtensionRequirement, Requirement, TransformError, Transformer};

/// Builds a transformer from its declaration.
pub type Constructor = fn(&TransformerConfig) -> Result<Box<dyn Transformer>, TransformError>;

/// Resolves declaration type names to constructors.
#[derive(Clone)]
pub struct TransformerFactory {
    constructors: HashMap<String, Constructor>,
}

impl Default for TransformerFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TransformerFactory {
    /// A factory that knows no types.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A factory that knows every built-in type.
    pub fn with_builtins() -> Self {
        let mut factory = Self::empty();
        factory.register("global_to_container", |_| Ok(Box::new(GlobalToContainerTransformer)));
        factory.register("global_variable", |_| Ok(Box::new(GlobalVariableTransformer)));
        factory.register("wp_options", |_| Ok(Box::new(WpOptionsTransformer)));
        factory.register("wpdb_direct_query", |_| Ok(Box::new(WpdbDirectQueryTransformer)));
        factory.register("output_buffer", |_| Ok(Box::new(OutputBufferTransformer)));
        factory.register("woocommerce_orders", |_| {
            Ok(Box::new(WooCommerceOrderTransformer::default()))
        });
        factory.register("replace", |config| {
            Ok(Box::new(ReplaceTransformer::from_options(&config.id, &config.options)?))
        });
        factory.register("regex", |config| {
            Ok(Box::new(RegexTransformer::from_options(&config.id, &config.options)?))
        });
        factory
    }

    /// Registers or replaces the constructor for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, constructor: Constructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Known type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Instantiates `config`. The declared priority and requirements are
    /// applied on top of the type's own.
    pub fn build(&self, config: &TransformerConfig) -> Result<Arc<dyn Transformer>, TransformError> {
        let kind = config.kind.as_deref().ok_or_else(|| TransformError::MissingType {
            id: config.id.clone(),
        })?;
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| TransformError::UnknownType {
                id: config.id.clone(),
                kind: kind.to_string(),
            })?;

        let inner = constructor(config)?;
        let requirements: Vec<Arc<dyn Requirement>> = config
            .requires
            .iter()
            .map(|r| Arc::new(ExtensionRequirement::from(r)) as Arc<dyn Requirement>)
            .collect();

        Ok(Arc::new(DeclaredTransformer::new(
            inner,
            config.priority,
            requirements,
        )))
    }
}

impl std::fmt::Debug for TransformerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerFactory")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use serde_json::json;
    use wpbridge_manifest::RequirementConfig;

    #[test]
    fn test_builtin_kinds() {
        let factory = TransformerFactory::default();
        assert_eq!(
            factory.kinds(),
            vec![
                "global_to_container",
                "global_variable",
                "output_buffer",
                "regex",
                "replace",
                "woocommerce_orders",
                "wp_options",
                "wpdb_direct_query",
            ]
        );
    }

    #[test]
    fn test_unknown_and_missing_types() {
        let factory = TransformerFactory::default();

        let config = TransformerConfig::new("x", "System\\Exec", &[]);
        assert!(matches!(
            factory.build(&config),
            Err(TransformError::UnknownType { .. })
        ));

        let config = TransformerConfig {
            kind: None,
            ..TransformerConfig::new("x", "unused", &[])
        };
        assert!(matches!(
            factory.build(&config),
            Err(TransformError::MissingType { .. })
        ));
    }

    #[test]
    fn test_build_applies_declared_priority_and_requirements() {
        let factory = TransformerFactory::default();
        let config = TransformerConfig {
            priority: Some(7),
            options: json!({ "search": "old_call(", "replace": "new_call(" }),
            requires: vec![RequirementConfig {
                extension: "sample".into(),
                operator: ">=".into(),
                version: "1.0".into(),
            }],
            ..TransformerConfig::new("sample_fix", "replace", &["old_call"])
        };

        let transformer = factory.build(&config).unwrap();
        assert_eq!(transformer.priority(), 7);
        assert_eq!(transformer.transform("old_call();").unwrap(), "new_call();");

        let matching = Context::for_extension("/p/sample/x.php", "sample", "2.0");
        let other = Context::for_extension("/p/other/x.php", "other", "2.0");
        assert!(transformer.requirements().iter().all(|r| r.check(&matching)));
        assert!(!transformer.requirements().iter().all(|r| r.check(&other)));
    }

    #[test]
    fn test_custom_constructor() {
        let mut factory = TransformerFactory::empty();
        factory.register("noop", |_| Ok(Box::new(ReplaceTransformer::new("a", "a"))));
        assert!(factory.knows("noop"));
        assert!(!factory.knows("replace"));
    }
}
