//! Qualifiers, navigation params and navigation payload maps.
//!
//! A qualifier is a flat string map identifying a capability or intention.
//! Pattern values support two wildcards:
//!
//! - `*` matches any value, but the key must be present.
//! - `?` matches any value or the absence of the key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Wildcard matching any present value.
pub const ANY_VALUE: &str = "*";

/// Wildcard matching any value or absence.
pub const OPTIONAL_VALUE: &str = "?";

/// Navigation params passed to a capability. Values are strings so they can
/// travel through URLs unchanged.
pub type ParamMap = BTreeMap<String, String>;

/// Public navigation data, persisted with the layout.
pub type NavigationData = BTreeMap<String, String>;

/// Private navigation state, kept in memory and in history entries only.
pub type NavigationState = BTreeMap<String, serde_json::Value>;

/// Test one value against an expected value that may be a wildcard.
#[must_use]
pub fn value_matches(actual: Option<&str>, expected: &str) -> bool {
    match (expected, actual) {
        (OPTIONAL_VALUE, _) => true,
        (ANY_VALUE, Some(_)) => true,
        (expected, Some(actual)) => actual == expected,
        (_, None) => false,
    }
}

/// Match navigation params against expected params, restricted to `required`.
///
/// Only the named params take part in the comparison; expected values may be
/// wildcards. A required param absent from `expected` matches anything.
#[must_use]
pub fn matches_required<'a>(
    actual: &ParamMap,
    expected: &ParamMap,
    required: impl IntoIterator<Item = &'a str>,
) -> bool {
    required.into_iter().all(|name| match expected.get(name) {
        Some(value) => value_matches(actual.get(name).map(String::as_str), value),
        None => true,
    })
}

/// Key-value map identifying a capability or intention.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qualifier(BTreeMap<String, String>);

impl Qualifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the qualifier contains wildcard values.
    #[must_use]
    pub fn has_wildcards(&self) -> bool {
        self.0
            .values()
            .any(|value| value == ANY_VALUE || value == OPTIONAL_VALUE)
    }

    /// Match this (concrete) qualifier against a pattern.
    ///
    /// Every pattern entry must be satisfied and this qualifier must not carry
    /// keys the pattern does not mention.
    #[must_use]
    pub fn matches(&self, pattern: &Qualifier) -> bool {
        let satisfied = pattern
            .0
            .iter()
            .all(|(key, expected)| value_matches(self.get(key), expected));
        satisfied && self.0.keys().all(|key| pattern.0.contains_key(key))
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (key, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Qualifier {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pairs: &[(&str, &str)]) -> Qualifier {
        pairs.iter().copied().collect()
    }

    #[test]
    fn exact_match_requires_same_keys() {
        let concrete = q(&[("component", "view"), ("app", "a")]);
        assert!(concrete.matches(&q(&[("component", "view"), ("app", "a")])));
        assert!(!concrete.matches(&q(&[("component", "view")])));
        assert!(!concrete.matches(&q(&[("component", "view"), ("app", "b")])));
    }

    #[test]
    fn any_wildcard_requires_presence() {
        let pattern = q(&[("component", "view"), ("entity", "*")]);
        assert!(q(&[("component", "view"), ("entity", "person")]).matches(&pattern));
        assert!(!q(&[("component", "view")]).matches(&pattern));
    }

    #[test]
    fn optional_wildcard_tolerates_absence() {
        let pattern = q(&[("component", "view"), ("entity", "?")]);
        assert!(q(&[("component", "view")]).matches(&pattern));
        assert!(q(&[("component", "view"), ("entity", "x")]).matches(&pattern));
    }

    #[test]
    fn display_is_deterministic() {
        assert_eq!(q(&[("b", "2"), ("a", "1")]).to_string(), "{a=1, b=2}");
    }

    #[test]
    fn value_matching() {
        assert!(value_matches(Some("1"), "1"));
        assert!(value_matches(Some("2"), ANY_VALUE));
        assert!(!value_matches(None, ANY_VALUE));
        assert!(value_matches(None, OPTIONAL_VALUE));
        assert!(!value_matches(Some("2"), "1"));
    }

    fn params(pairs: &[(&str, &str)]) -> ParamMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn required_params_ignore_optional_ones() {
        let actual = params(&[("seg1", "1"), ("opt", "x")]);
        assert!(matches_required(&actual, &params(&[("seg1", "1"), ("opt", "y")]), ["seg1"]));
        assert!(!matches_required(&actual, &params(&[("seg1", "2")]), ["seg1"]));
        assert!(matches_required(&actual, &params(&[("seg1", ANY_VALUE)]), ["seg1"]));
        assert!(!matches_required(&params(&[]), &params(&[("seg1", ANY_VALUE)]), ["seg1"]));
    }
}
