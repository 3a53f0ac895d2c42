use std::sync::Arc;

use crate::{ExtensionRequirement, Requirement, TransformError, Transformer};

/// Replaces direct order meta writes in older WooCommerce gateways with the
/// order object's setter. Only applies to WooCommerce 3.0 and later.
#[derive(Debug, Clone)]
pub struct WooCommerceOrderTransformer {
    requirements: Vec<Arc<dyn Requirement>>,
}

impl Default for WooCommerceOrderTransformer {
    fn default() -> Self {
        Self {
            requirements: vec![Arc::new(ExtensionRequirement::new("woocommerce", ">=", "3.0"))],
        }
    }
}

impl Transformer for WooCommerceOrderTransformer {
    fn priority(&self) -> i32 {
        80
    }

    fn requirements(&self) -> &[Arc<dyn Requirement>] {
        &self.requirements
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        Ok(source.replace(
            "update_post_meta($order_id, '_transaction_id'",
            "$order->set_transaction_id(",
        ))
    }
}
