//! Name matching rules used for parameter filters and purge exclusions

use serde::{Deserialize, Serialize};

/// Set of name rules; a name matches if any single rule matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameRules {
    /// Exact names
    pub equals: Vec<String>,
    /// Substrings
    pub contains: Vec<String>,
    /// Prefixes
    pub starts_with: Vec<String>,
}

impl NameRules {
    /// Create empty rule set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-name rule
    #[must_use]
    pub fn equals(mut self, name: impl Into<String>) -> Self {
        self.equals.push(name.into());
        self
    }

    /// Add a substring rule
    #[must_use]
    pub fn contains(mut self, fragment: impl Into<String>) -> Self {
        self.contains.push(fragment.into());
        self
    }

    /// Add a prefix rule
    #[must_use]
    pub fn starts_with(mut self, prefix: impl Into<String>) -> Self {
        self.starts_with.push(prefix.into());
        self
    }

    /// True when no rules are configured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.contains.is_empty() && self.starts_with.is_empty()
    }

    /// Check whether `name` matches any rule
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.equals.iter().any(|e| e == name)
            || self
                .contains
                .iter()
                .any(|c| !c.is_empty() && name.contains(c.as_str()))
            || self
                .starts_with
                .iter()
                .any(|p| !p.is_empty() && name.starts_with(p.as_str()))
    }
}

/// Include/exclude filter applied to parameter names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamFilter {
    /// When non-empty, only matching names pass
    pub include: NameRules,
    /// Matching names never pass
    pub exclude: NameRules,
}

impl ParamFilter {
    /// Check whether a parameter name passes the filter
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        (self.include.is_empty() || self.include.matches(name)) && !self.exclude.matches(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_match_any() {
        let rules = NameRules::new()
            .equals("Keep")
            .contains("Legacy")
            .starts_with("_");
        assert!(rules.matches("Keep"));
        assert!(!rules.matches("Keeper"));
        assert!(rules.matches("Old Legacy Width"));
        assert!(rules.matches("_internal"));
        assert!(!rules.matches("Width"));
    }

    #[test]
    fn empty_fragments_never_match() {
        let rules = NameRules::new().contains("").starts_with("");
        assert!(!rules.matches("Width"));
    }

    #[test]
    fn filter_include_and_exclude() {
        let mut filter = ParamFilter::default();
        assert!(filter.accepts("Anything"));

        filter.include = NameRules::new().starts_with("PE_");
        filter.exclude = NameRules::new().equals("PE_Skip");
        assert!(filter.accepts("PE_Width"));
        assert!(!filter.accepts("Width"));
        assert!(!filter.accepts("PE_Skip"));
    }
}
