//! Glob include/exclude filtering on relative paths

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

use crate::error::{ContextError, Result};

/// Longest pattern accepted from a caller
pub const MAX_PATTERN_LEN: usize = 200;

/// Most wildcard tokens accepted in a single pattern
pub const MAX_WILDCARD_TOKENS: usize = 10;

/// Compiled include/exclude globs.
///
/// A path passes when there are no includes or at least one include matches,
/// and no exclude matches. Exclusion always wins.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    includes: Option<GlobSet>,
    excludes: GlobSet,
}

impl PatternFilter {
    /// Validate and compile the given patterns.
    ///
    /// Fails on the first unsafe or malformed pattern, before any filesystem
    /// work can start.
    pub fn new<S: AsRef<str>>(includes: &[S], excludes: &[S]) -> Result<Self> {
        let includes = if includes.is_empty() {
            None
        } else {
            Some(build_set(includes)?)
        };
        let excludes = build_set(excludes)?;

        Ok(Self { includes, excludes })
    }

    /// A filter that accepts every path
    pub fn allow_all() -> Self {
        Self {
            includes: None,
            excludes: GlobSet::empty(),
        }
    }

    /// Check a relative path. Backslashes are treated as separators.
    pub fn matches(&self, relative_path: &str) -> bool {
        let normalized = normalize_separators(relative_path);
        let path = Path::new(normalized.as_str());

        if self.excludes.is_match(path) {
            return false;
        }
        match &self.includes {
            Some(set) => set.is_match(path),
            None => true,
        }
    }
}

/// One-shot form of [`PatternFilter::matches`]
pub fn matches<S: AsRef<str>>(relative_path: &str, includes: &[S], excludes: &[S]) -> Result<bool> {
    Ok(PatternFilter::new(includes, excludes)?.matches(relative_path))
}

/// Reject patterns that are empty, too long or too wildcard-dense.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(ContextError::pattern(
            pattern,
            "pattern is empty; remove it or supply a glob such as 'src/**/*.rs'",
        ));
    }

    let len = pattern.chars().count();
    if len > MAX_PATTERN_LEN {
        return Err(ContextError::pattern(
            pattern,
            format!(
                "pattern is {} characters long, the limit is {}; use a shorter glob or split it",
                len, MAX_PATTERN_LEN
            ),
        ));
    }

    let wildcards = count_wildcard_tokens(pattern);
    if wildcards > MAX_WILDCARD_TOKENS {
        return Err(ContextError::pattern(
            pattern,
            format!(
                "pattern has {} wildcard tokens, the limit is {}; use fewer '*', '?' or '{{...}}' groups",
                wildcards, MAX_WILDCARD_TOKENS
            ),
        ));
    }

    Ok(())
}

/// Count wildcard tokens. A run of `*` counts once.
fn count_wildcard_tokens(pattern: &str) -> usize {
    let mut count = 0;
    let mut in_star_run = false;
    for c in pattern.chars() {
        match c {
            '*' => {
                if !in_star_run {
                    count += 1;
                }
                in_star_run = true;
                continue;
            }
            '?' | '{' => count += 1,
            _ => {}
        }
        in_star_run = false;
    }
    count
}

fn build_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        validate_pattern(pattern)?;

        let glob = GlobBuilder::new(&normalize_separators(pattern))
            .literal_separator(true)
            .build()
            .map_err(|e| ContextError::pattern(pattern, format!("not a valid glob: {}", e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ContextError::Config(format!("Failed to compile glob set: {}", e)))
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}
