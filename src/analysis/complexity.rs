//! Structural complexity scoring for component source files.
//!
//! The score is a lexical heuristic, not a parse. Type-level declarations are
//! skipped by tracking brace depth line by line, so braces that appear inside
//! string literals or comments are counted like any other brace. Scores in
//! existing fixtures are calibrated against exactly this behavior.

use std::sync::OnceLock;

use regex::Regex;

/// Scores strictly below this value mark a file as a "simple" candidate.
pub const SIMPLE_THRESHOLD: f64 = 0.3;

/// Raw complexity that maps onto [`SIMPLE_THRESHOLD`].
const REFERENCE_RAW: f64 = 15.0;

/// Raw complexity at which the score saturates at 1.0.
const SATURATION_RAW: f64 = REFERENCE_RAW / SIMPLE_THRESHOLD;

const RUNTIME_LINE_WEIGHT: f64 = 1.0;
const IMPORT_LINE_WEIGHT: f64 = 0.5;

fn type_declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:export\s+)?(?:declare\s+)?(?:type|interface)\s+[A-Za-z_$][\w$]*|^export\s+type\s*\{",
        )
        .expect("type declaration pattern is valid")
    })
}

fn statement_start_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:export|import|const|let|var|function|class|async)\b")
            .expect("statement start pattern is valid")
    })
}

/// Line counts feeding the raw complexity value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    /// Non-blank lines outside type-only declarations (imports included).
    pub runtime_lines: usize,
    /// Runtime lines that start with an `import` keyword.
    pub import_lines: usize,
}

impl LineCounts {
    /// Weighted sum of the counted lines.
    pub fn raw_complexity(&self) -> f64 {
        self.runtime_lines as f64 * RUNTIME_LINE_WEIGHT
            + self.import_lines as f64 * IMPORT_LINE_WEIGHT
    }
}

/// Count runtime and import lines, skipping blank lines and type-only blocks.
pub fn count_lines(source: &str) -> LineCounts {
    let mut counts = LineCounts::default();
    let mut in_type_block = false;
    let mut depth: i64 = 0;

    for line in source.lines() {
        let trimmed = line.trim();

        if in_type_block {
            // An unterminated alias must not swallow the statements after it.
            let reopens = depth <= 0 && statement_start_pattern().is_match(trimmed);
            if !reopens {
                depth += brace_delta(trimmed);
                if depth <= 0 && closes_block(trimmed) {
                    in_type_block = false;
                    depth = 0;
                }
                continue;
            }
            in_type_block = false;
            depth = 0;
        }

        if trimmed.is_empty() {
            continue;
        }

        if type_declaration_pattern().is_match(trimmed) {
            depth = brace_delta(trimmed);
            in_type_block = depth > 0 || trimmed.ends_with('=');
            if !in_type_block {
                depth = 0;
            }
            continue;
        }

        counts.runtime_lines += 1;
        if is_import_line(trimmed) {
            counts.import_lines += 1;
        }
    }

    counts
}

/// Score a source file's structural complexity in `[0, 1]`.
///
/// Empty input and files made only of type declarations score 0. A raw
/// complexity of 15 maps to 0.3 and the score saturates at 1.
pub fn complexity_score(source: &str) -> f64 {
    let raw = count_lines(source).raw_complexity();
    (raw / SATURATION_RAW).min(1.0)
}

/// Whether a score qualifies as a simple candidate.
pub fn is_simple(score: f64) -> bool {
    score < SIMPLE_THRESHOLD
}

fn brace_delta(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

fn closes_block(line: &str) -> bool {
    line.ends_with(';') || line.ends_with('}')
}

fn is_import_line(line: &str) -> bool {
    line.strip_prefix("import").is_some_and(|rest| {
        rest.starts_with(|c: char| c.is_whitespace() || matches!(c, '{' | '*' | '"' | '\''))
    })
}
