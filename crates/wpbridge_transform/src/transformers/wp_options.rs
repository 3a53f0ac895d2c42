use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::{TransformError, Transformer};

/// Legacy option-store functions routed to the host options service.
pub const OPTION_FUNCTIONS: &[&str] = &[
    "get_option",
    "update_option",
    "add_option",
    "delete_option",
    "get_transient",
    "set_transient",
    "delete_transient",
    "get_site_option",
    "update_site_option",
];

fn option_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Method calls, static calls and declarations are captured in group 1
        // and left alone.
        let pattern = format!(
            r"(->\s*|::\s*|\bfunction\s+&?\s*)?\b({})\s*\(",
            OPTION_FUNCTIONS.join("|")
        );
        Regex::new(&pattern).expect("Invalid option call pattern")
    })
}

/// Rewrites option and transient calls to the host options service:
/// `get_option('x')` becomes `app('wp.options')->get_option('x')`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WpOptionsTransformer;

impl Transformer for WpOptionsTransformer {
    fn priority(&self) -> i32 {
        90
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        let rewritten = option_call().replace_all(source, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                format!("app('wp.options')->{}(", &caps[2])
            }
        });
        Ok(rewritten.into_owned())
    }
}
