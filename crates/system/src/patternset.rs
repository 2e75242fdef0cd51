//! Include/exclude glob filter
//!
//! A name matches when it matches no exclude pattern and at least one
//! include pattern. An empty include set matches nothing.

use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeMap;

/// Set of include and exclude glob patterns
///
/// `*` does not cross `/`; `**` does.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    includes: BTreeMap<String, GlobMatcher>,
    excludes: BTreeMap<String, GlobMatcher>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern as an include or exclude
    ///
    /// The pattern is compiled up front; malformed syntax is rejected
    /// without touching either set. Duplicates collapse.
    pub fn add(&mut self, pattern: &str, include: bool) -> Result<()> {
        let matcher = compile(pattern)?;
        let set = if include {
            &mut self.includes
        } else {
            &mut self.excludes
        };
        set.insert(pattern.to_string(), matcher);
        Ok(())
    }

    /// Whether `name` passes the filter
    pub fn matches(&self, name: &str) -> bool {
        if self.excludes.values().any(|m| m.is_match(name)) {
            return false;
        }
        self.includes.values().any(|m| m.is_match(name))
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.includes.keys().map(String::as_str)
    }

    pub fn excludes(&self) -> impl Iterator<Item = &str> {
        self.excludes.keys().map(String::as_str)
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.kind().to_string(),
        })
}
