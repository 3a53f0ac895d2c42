use std::sync::OnceLock;

use regex::Regex;

use crate::{TransformError, Transformer};

fn globals_access() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"\$GLOBALS\s*\[\s*['"](wp_version|wp_db_version|tinymce_version|wp_local_package)['"]\s*\]"#,
        )
        .expect("Invalid $GLOBALS pattern")
    })
}

/// Rewrites reads of well-known `$GLOBALS` entries into global container
/// lookups. Runs before [`GlobalToContainerTransformer`](super::GlobalToContainerTransformer).
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalVariableTransformer;

impl Transformer for GlobalVariableTransformer {
    fn priority(&self) -> i32 {
        110
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        Ok(globals_access()
            .replace_all(source, "app('global')->get('${1}')")
            .into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("$v = $GLOBALS['wp_version'];", "$v = app('global')->get('wp_version');")]
    #[case(r#"$GLOBALS[ "wp_db_version" ]"#, "app('global')->get('wp_db_version')")]
    #[case("$GLOBALS['my_plugin']", "$GLOBALS['my_plugin']")]
    fn test_rewrite(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(GlobalVariableTransformer.transform(source).unwrap(), expected);
    }
}
