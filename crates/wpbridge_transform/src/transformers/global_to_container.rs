use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::{TransformError, Transformer};

/// Globals that resolve to a typed host service instead of the generic
/// global container.
const SERVICE_MAP: &[(&str, &str)] = &[
    ("wpdb", "Cycle\\Database\\DatabaseInterface"),
    ("wp_rewrite", "PrestoWorld\\Routing\\Router"),
    ("wp_query", "PrestoWorld\\Http\\Request"),
    ("current_user", "Witals\\Framework\\Auth\\AuthContextInterface"),
];

fn global_statement() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bglobal\s+(\$[A-Za-z0-9_]+(?:\s*,\s*\$[A-Za-z0-9_]+)*)\s*;")
            .expect("Invalid global statement pattern")
    })
}

/// Rewrites `global $a, $b;` into one container lookup per variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalToContainerTransformer;

impl GlobalToContainerTransformer {
    fn lookup(variable: &str) -> String {
        let name = variable.trim_start_matches('$');
        match SERVICE_MAP.iter().find(|(global, _)| *global == name) {
            Some((_, service)) => format!("{variable} = app('{service}');"),
            None => format!("{variable} = app('global')->get('{name}');"),
        }
    }
}

impl Transformer for GlobalToContainerTransformer {
    fn priority(&self) -> i32 {
        100
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        let rewritten = global_statement().replace_all(source, |caps: &Captures<'_>| {
            caps[1]
                .split(',')
                .map(|variable| Self::lookup(variable.trim()))
                .collect::<Vec<_>>()
                .join("\n")
        });
        Ok(rewritten.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_and_generic_globals() {
        let output = GlobalToContainerTransformer
            .transform("function f() {\n    global $wpdb, $post;\n    return $post;\n}")
            .unwrap();

        insta::assert_snapshot!(output, @r"
        function f() {
            $wpdb = app('Cycle\Database\DatabaseInterface');
        $post = app('global')->get('post');
            return $post;
        }
        ");
    }

    #[test]
    fn test_is_idempotent() {
        let once = GlobalToContainerTransformer.transform("global $current_user;").unwrap();
        let twice = GlobalToContainerTransformer.transform(&once).unwrap();
        assert_eq!(once, "$current_user = app('Witals\\Framework\\Auth\\AuthContextInterface');");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_ignores_non_statements() {
        let source = "$globalValue = 1; // global scope";
        assert_eq!(GlobalToContainerTransformer.transform(source).unwrap(), source);
    }
}
