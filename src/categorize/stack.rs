//! Dependency fingerprinting from stack traces.
//!
//! Dev servers that pre-bundle dependencies serve them from a `deps`
//! directory, so a stack frame such as
//! `/node_modules/.vite/deps/@emotion_react.js?v=1a2b:120:9` reveals which
//! package was executing. Other bundlers can plug in their own extractor.

use std::collections::BTreeSet;

use regex::Regex;

/// Extracts dependency package names from a stack trace.
pub trait DependencyExtractor: Send + Sync {
    fn extract(&self, stack: &str) -> BTreeSet<String>;
}

/// Regex-driven extractor for `/deps/<name>.js` path segments.
#[derive(Debug, Clone)]
pub struct DepsPathExtractor {
    pattern: Regex,
}

impl DepsPathExtractor {
    /// Matches the flattened module id served from a `deps` directory.
    pub const DEFAULT_PATTERN: &'static str = r"/deps/([^/\s?:)]+)\.js";

    /// Build an extractor from a pattern whose first capture group is the
    /// flattened module id.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Default for DepsPathExtractor {
    fn default() -> Self {
        Self {
            pattern: Regex::new(Self::DEFAULT_PATTERN).expect("default deps pattern is valid"),
        }
    }
}

impl DependencyExtractor for DepsPathExtractor {
    fn extract(&self, stack: &str) -> BTreeSet<String> {
        self.pattern
            .captures_iter(stack)
            .filter_map(|c| c.get(1))
            .filter_map(|m| package_name(m.as_str()))
            .collect()
    }
}

/// Recover a package name from a flattened module id.
///
/// Flattening replaces `/` with `_`, so `@scope_pkg_sub` becomes
/// `@scope/pkg` and `react-dom_client` becomes `react-dom`. Shared chunks
/// (`chunk-XYZ`) carry no package information.
pub fn package_name(flattened: &str) -> Option<String> {
    if flattened.is_empty() || flattened.starts_with("chunk-") {
        return None;
    }

    let mut parts = flattened.split('_').filter(|p| !p.is_empty());
    if flattened.starts_with('@') {
        let scope = parts.next()?;
        let name = parts.next()?;
        Some(format!("{scope}/{name}").to_lowercase())
    } else {
        parts.next().map(str::to_lowercase)
    }
}
