//! Component validity check.
//!
//! A file is a usable candidate only when it renders JSX and exports
//! something. Real projects can plug in an AST-backed analyzer; the default
//! [`LexicalAnalyzer`] answers both questions with line-level patterns.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Presence flags reported by a [`ComponentAnalyzer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentFacts {
    pub has_jsx: bool,
    pub has_export: bool,
}

impl ComponentFacts {
    /// Both JSX and at least one export are required.
    pub fn is_candidate(&self) -> bool {
        self.has_jsx && self.has_export
    }
}

/// Service answering whether a source file looks like an exported component.
pub trait ComponentAnalyzer: Send + Sync {
    fn analyze(&self, path: &Path, source: &str) -> ComponentFacts;
}

/// Pattern-based analyzer used when no parser is supplied.
///
/// JSX is recognised as a tag opening right after an expression boundary
/// (`return`, `(`, `=>`, `?`, `:`, `&&`, ...), which keeps TypeScript
/// generics such as `useState<string>()` from matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalAnalyzer;

fn jsx_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)(?:^|[\s(=>?:&|,{\[])<(?:>|/?[A-Za-z][\w.:-]*(?:\s|/?>|$))")
            .expect("jsx pattern is valid")
    })
}

fn export_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:export\s+(?:default\b|const\b|let\b|var\b|function\b|async\b|class\b|\{|\*)|module\.exports\b)",
        )
        .expect("export pattern is valid")
    })
}

impl ComponentAnalyzer for LexicalAnalyzer {
    fn analyze(&self, _path: &Path, source: &str) -> ComponentFacts {
        ComponentFacts {
            has_jsx: jsx_pattern().is_match(source),
            has_export: export_pattern().is_match(source),
        }
    }
}
