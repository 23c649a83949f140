//! Incremental candidate selection.
//!
//! Files are analyzed strictly in input order and the scan stops as soon as
//! enough simple candidates are found, so the number of reads never exceeds
//! what the early exit requires.

use std::path::Path;

use tracing::debug;

use crate::analysis::{complexity_score, is_simple, ComponentAnalyzer};
use crate::round2;

use super::source::FileSource;

/// A valid component file with its complexity score.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub path: String,
    pub complexity: f64,
}

/// Outcome of a selection pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionResult {
    /// Selected paths, least complex first.
    pub candidates: Vec<String>,
    /// Number of files that passed the validity check and were scored.
    pub analyzed_count: usize,
    /// Mean complexity of the selected set, rounded to two decimals.
    pub avg_complexity: f64,
}

/// Scores files one by one until enough simple candidates are found.
pub struct CandidateSelector<'a> {
    source: &'a dyn FileSource,
    analyzer: &'a dyn ComponentAnalyzer,
    root: &'a Path,
}

impl<'a> CandidateSelector<'a> {
    /// Create a selector reading files relative to `root`.
    pub fn new(
        source: &'a dyn FileSource,
        analyzer: &'a dyn ComponentAnalyzer,
        root: &'a Path,
    ) -> Self {
        Self {
            source,
            analyzer,
            root,
        }
    }

    /// Pick up to `sample_count` candidates from `files`.
    ///
    /// When fewer than `sample_count` simple files exist, the least complex
    /// files among everything analyzed are returned instead.
    pub async fn select(&self, files: &[String], sample_count: usize) -> SelectionResult {
        let mut simple: Vec<CandidateFile> = Vec::new();
        let mut analyzed: Vec<CandidateFile> = Vec::new();

        for file in files {
            if simple.len() >= sample_count {
                break;
            }

            let path = self.root.join(file);
            let source = match self.source.read_to_string(&path).await {
                Ok(source) => source,
                Err(e) => {
                    debug!(file = %file, error = %e, "skipping unreadable file");
                    continue;
                }
            };

            if !self.analyzer.analyze(&path, &source).is_candidate() {
                continue;
            }

            let candidate = CandidateFile {
                path: file.clone(),
                complexity: complexity_score(&source),
            };
            if is_simple(candidate.complexity) {
                simple.push(candidate.clone());
            }
            analyzed.push(candidate);
        }

        let analyzed_count = analyzed.len();
        let mut pool = if simple.len() >= sample_count {
            simple
        } else {
            analyzed
        };
        pool.sort_by(|a, b| a.complexity.total_cmp(&b.complexity));
        pool.truncate(sample_count);

        let avg_complexity = if pool.is_empty() {
            0.0
        } else {
            round2(pool.iter().map(|c| c.complexity).sum::<f64>() / pool.len() as f64)
        };

        debug!(
            selected = pool.len(),
            analyzed = analyzed_count,
            avg_complexity,
            "candidate selection finished"
        );

        SelectionResult {
            candidates: pool.into_iter().map(|c| c.path).collect(),
            analyzed_count,
            avg_complexity,
        }
    }
}
