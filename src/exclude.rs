//! Exclusion rules.
//!
//! A rule without a path separator matches a whole path component
//! (`snapraid` excludes `/x/snapraid/y` but not `/x/snapraid.old`).
//! A rule with a separator matches a contiguous run of components anywhere in
//! the path (`media/downloads` excludes `/a/media/downloads/b`).
//!
//! Callers pass paths relative to the tree being walked, so the root itself
//! never contributes components.

use std::path::{Component, Path};

/// Ordered list of exclusion patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Component(String),
    SubPath(Vec<String>),
}

impl ExclusionRules {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = patterns
            .into_iter()
            .filter_map(|p| Rule::parse(p.as_ref()))
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

impl Rule {
    fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<String> = raw
            .split(['/', '\\'])
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != ".")
            .map(str::to_owned)
            .collect();
        match parts.len() {
            0 => None,
            1 if !raw.contains(['/', '\\']) => parts.into_iter().next().map(Rule::Component),
            _ => Some(Rule::SubPath(parts)),
        }
    }

    fn matches(&self, components: &[&str]) -> bool {
        match self {
            Rule::Component(name) => components.iter().any(|c| c == name),
            Rule::SubPath(seq) => components
                .windows(seq.len())
                .any(|w| w.iter().zip(seq).all(|(a, b)| a == b)),
        }
    }
}

/// True if any rule matches `path`.
pub fn is_excluded(path: &Path, rules: &ExclusionRules) -> bool {
    if rules.is_empty() {
        return false;
    }
    let owned: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let components: Vec<&str> = owned.iter().map(String::as_str).collect();
    rules.rules.iter().any(|r| r.matches(&components))
}
