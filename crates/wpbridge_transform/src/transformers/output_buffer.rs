use std::sync::OnceLock;

use regex::Regex;

use crate::{TransformError, Transformer};

fn wp_die_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\bwp_die\((.*?)\);").expect("Invalid wp_die pattern"))
}

/// Replaces `wp_die(...)`, which writes straight to the response, with the
/// host's buffered equivalent.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputBufferTransformer;

impl Transformer for OutputBufferTransformer {
    fn priority(&self) -> i32 {
        50
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        Ok(wp_die_call()
            .replace_all(source, r"\PrestoWorld\Bridge\Output::die(${1});")
            .into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_multiline_call() {
        let output = OutputBufferTransformer
            .transform("if ($bad) {\n    wp_die(\n        'Nope'\n    );\n}")
            .unwrap();
        insta::assert_snapshot!(output, @r"
        if ($bad) {
            \PrestoWorld\Bridge\Output::die(
                'Nope'
            );
        }
        ");
    }

    #[test]
    fn test_is_idempotent() {
        let once = OutputBufferTransformer.transform("wp_die('x');").unwrap();
        assert_eq!(once, r"\PrestoWorld\Bridge\Output::die('x');");
        assert_eq!(OutputBufferTransformer.transform(&once).unwrap(), once);
    }
}
