//! Version ordering and version-constraint matching.
//!
//! Extension versions in the wild are rarely strict semver (`2.0`, `1.2.3.4`,
//! `3.0-beta2` are all common), so ordering follows the canonical-segment
//! rules legacy extension tooling uses: separators (`.`, `-`, `_`, `+`) and
//! digit/letter transitions split a version into segments, numeric segments
//! compare numerically, and release tags compare as
//! `dev < alpha = a < beta = b < RC = rc < <number> < pl = p`.

use std::cmp::Ordering;

/// A version constraint as declared by registry entries.
///
/// Only four forms exist: `*`, `>=X`, `<=X` and an exact version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// `*`, matching every version.
    Any,
    /// `>=X`
    AtLeast(String),
    /// `<=X`
    AtMost(String),
    /// An exact version.
    Exact(String),
    /// Anything else. Never matches.
    Malformed(String),
}

impl VersionConstraint {
    /// Parses a constraint string.
    pub fn parse(constraint: &str) -> Self {
        let constraint = constraint.trim();

        if constraint == "*" {
            return Self::Any;
        }
        if let Some(rest) = constraint.strip_prefix(">=") {
            return Self::bounded(rest, Self::AtLeast, constraint);
        }
        if let Some(rest) = constraint.strip_prefix("<=") {
            return Self::bounded(rest, Self::AtMost, constraint);
        }

        match constraint.chars().next() {
            Some(c) if c.is_ascii_alphanumeric() => Self::Exact(constraint.to_string()),
            _ => Self::Malformed(constraint.to_string()),
        }
    }

    fn bounded(rest: &str, make: fn(String) -> Self, original: &str) -> Self {
        let rest = rest.trim();
        if rest.is_empty() {
            Self::Malformed(original.to_string())
        } else {
            make(rest.to_string())
        }
    }

    /// Returns whether `version` satisfies this constraint.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            Self::Any => true,
            Self::AtLeast(bound) => compare_versions(version, bound) != Ordering::Less,
            Self::AtMost(bound) => compare_versions(version, bound) != Ordering::Greater,
            Self::Exact(expected) => compare_versions(version, expected) == Ordering::Equal,
            Self::Malformed(_) => false,
        }
    }
}

/// Returns whether `version` satisfies `constraint`.
pub fn matches_version(version: &str, constraint: &str) -> bool {
    VersionConstraint::parse(constraint).matches(version)
}

/// Evaluates `version <operator> other`.
///
/// Accepts the symbolic operators (`<`, `<=`, `>`, `>=`, `==`, `=`, `!=`, `<>`)
/// and their mnemonic spellings (`lt`, `le`, `gt`, `ge`, `eq`, `ne`).
/// Returns `None` for an unknown operator.
pub fn compare_with(version: &str, operator: &str, other: &str) -> Option<bool> {
    let ordering = compare_versions(version, other);
    let result = match operator.trim() {
        "<" | "lt" => ordering == Ordering::Less,
        "<=" | "le" => ordering != Ordering::Greater,
        ">" | "gt" => ordering == Ordering::Greater,
        ">=" | "ge" => ordering != Ordering::Less,
        "==" | "=" | "eq" => ordering == Ordering::Equal,
        "!=" | "<>" | "ne" => ordering != Ordering::Equal,
        _ => return None,
    };
    Some(result)
}

/// Compares two version strings.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let left = segments(left);
    let right = segments(right);

    let mut left_iter = left.iter();
    let mut right_iter = right.iter();

    loop {
        match (left_iter.next(), right_iter.next()) {
            (Some(l), Some(r)) => {
                let ordering = compare_segments(l, r);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), None) => return trailing(l),
            (None, Some(r)) => return trailing(r).reverse(),
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Ordering of the longer version against the shorter one when only the
/// longer one has a segment left: a number makes it newer, a tag is weighed
/// against an implicit numeric segment.
fn trailing(segment: &Segment<'_>) -> Ordering {
    match segment {
        Segment::Number(_) => Ordering::Greater,
        Segment::Tag(tag) => tag_rank(tag).cmp(&NUMBER_RANK),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Number(&'a str),
    Tag(&'a str),
}

const NUMBER_RANK: i8 = 4;

fn tag_rank(tag: &str) -> i8 {
    match tag.to_ascii_lowercase().as_str() {
        "dev" => 0,
        "alpha" | "a" => 1,
        "beta" | "b" => 2,
        "rc" => 3,
        "pl" | "p" => 5,
        _ => -1,
    }
}

fn compare_segments(left: &Segment<'_>, right: &Segment<'_>) -> Ordering {
    match (left, right) {
        (Segment::Number(l), Segment::Number(r)) => compare_numeric(l, r),
        (Segment::Number(_), Segment::Tag(t)) => NUMBER_RANK.cmp(&tag_rank(t)),
        (Segment::Tag(t), Segment::Number(_)) => tag_rank(t).cmp(&NUMBER_RANK),
        (Segment::Tag(l), Segment::Tag(r)) => tag_rank(l).cmp(&tag_rank(r)),
    }
}

/// Numeric comparison without overflow: strip leading zeros, then longer is
/// larger, then lexicographic.
fn compare_numeric(left: &str, right: &str) -> Ordering {
    let left = left.trim_start_matches('0');
    let right = right.trim_start_matches('0');
    left.len().cmp(&right.len()).then_with(|| left.cmp(right))
}

fn segments(version: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let bytes = version.as_bytes();
    let mut start = 0;

    while start < bytes.len() {
        let b = bytes[start];
        if !b.is_ascii_alphanumeric() {
            start += 1;
            continue;
        }

        let numeric = b.is_ascii_digit();
        let mut end = start;
        while end < bytes.len()
            && bytes[end].is_ascii_alphanumeric()
            && bytes[end].is_ascii_digit() == numeric
        {
            end += 1;
        }

        let text = &version[start..end];
        out.push(if numeric {
            Segment::Number(text)
        } else {
            Segment::Tag(text)
        });
        start = end;
    }

    out
}
