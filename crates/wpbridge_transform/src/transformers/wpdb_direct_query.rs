use crate::{TransformError, Transformer};

/// Routes `$wpdb->query(` through the host's guarded query method.
#[derive(Debug, Clone, Copy, Default)]
pub struct WpdbDirectQueryTransformer;

impl Transformer for WpdbDirectQueryTransformer {
    fn priority(&self) -> i32 {
        90
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        Ok(source.replace("$wpdb->query(", "$wpdb->safe_query("))
    }
}
