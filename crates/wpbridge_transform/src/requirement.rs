//! Applicability requirements.
//!
//! A requirement decides whether a candidate transformer may run for a given
//! [`Context`]. A failed requirement silently drops the transformer from the
//! compilation; it is not an error.

use std::fmt;

use wpbridge_manifest::{RequirementConfig, compare_with};

use crate::Context;

/// A predicate over a compilation context.
pub trait Requirement: fmt::Debug + Send + Sync {
    /// Returns whether the requirement holds for `context`.
    fn check(&self, context: &Context) -> bool;
}

/// Version that disables the version comparison.
const ANY_VERSION: &str = "0.0.0";

/// Requires the compiled file to belong to a given extension, optionally at
/// a version satisfying `operator version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRequirement {
    extension: String,
    operator: String,
    version: String,
}

impl ExtensionRequirement {
    pub fn new(
        extension: impl Into<String>,
        operator: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            extension: extension.into(),
            operator: operator.into(),
            version: version.into(),
        }
    }

    /// Requires the extension at any version.
    pub fn any_version(extension: impl Into<String>) -> Self {
        Self::new(extension, ">=", ANY_VERSION)
    }
}

impl From<&RequirementConfig> for ExtensionRequirement {
    fn from(config: &RequirementConfig) -> Self {
        Self::new(&config.extension, &config.operator, &config.version)
    }
}

impl Requirement for ExtensionRequirement {
    fn check(&self, context: &Context) -> bool {
        if context.extension != self.extension {
            return false;
        }

        if self.version == ANY_VERSION {
            return true;
        }

        compare_with(&context.extension_version, &self.operator, &self.version).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("woocommerce", "3.5", true)]
    #[case("woocommerce", "3.0", true)]
    #[case("woocommerce", "2.6", false)]
    #[case("other", "9.0", false)]
    #[case("", "", false)]
    fn test_extension_requirement(
        #[case] extension: &str,
        #[case] version: &str,
        #[case] expected: bool,
    ) {
        let requirement = ExtensionRequirement::new("woocommerce", ">=", "3.0");
        let context = Context::for_extension("/x.php", extension, version);
        assert_eq!(requirement.check(&context), expected);
    }

    #[test]
    fn test_any_version_skips_comparison() {
        let requirement = ExtensionRequirement::any_version("sample");
        assert!(requirement.check(&Context::for_extension("/x.php", "sample", "")));
    }

    #[test]
    fn test_unknown_operator_fails_closed() {
        let requirement = ExtensionRequirement::new("sample", "~>", "1.0");
        assert!(!requirement.check(&Context::for_extension("/x.php", "sample", "1.0")));
    }
}
