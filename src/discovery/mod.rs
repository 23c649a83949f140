//! Candidate discovery.
//!
//! Enumerates component files matching a glob, drops anything on the
//! exclusion list, then hands the remainder to the [`CandidateSelector`].
//! Failures never escape: they are reported through
//! [`ComponentCandidatesResult::error`].

pub mod selector;
pub mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::{ComponentAnalyzer, LexicalAnalyzer};

pub use selector::{CandidateFile, CandidateSelector, SelectionResult};
pub use source::{expand_braces, FileEnumerator, FileSource, FsFileSource, WalkEnumerator};

/// Error string reported when enumeration fails.
pub const FIND_CANDIDATES_ERROR: &str = "Failed to find candidates";

/// Default number of candidates to sample.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;

/// Default glob for component files.
pub const DEFAULT_GLOB_PATTERN: &str = "**/*.{tsx,jsx}";

/// Directories never scanned for candidates.
const EXCLUDED_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "__mocks__",
    "build",
    "storybook-static",
];

/// File name patterns for tests, declarations, configs and stories.
const EXCLUDED_FILE_PATTERNS: &[&str] = &["*.test.*", "*.d.*", "*.config.*", "*.spec.*", "*.stories.*"];

/// Example components generated by the Storybook CLI into `stories/`.
const EXAMPLE_COMPONENT_PATTERNS: &[&str] = &["button.*", "header.*", "page.*"];

/// Errors that can occur while enumerating candidate files.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The project root is missing or not a directory.
    #[error("Project root does not exist: {0}")]
    MissingRoot(PathBuf),

    /// A glob pattern failed to compile.
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The directory walk failed.
    #[error("File walk failed: {0}")]
    Walk(String),
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Options for a single discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Number of candidates to select.
    pub sample_size: usize,
    /// Glob pattern, relative to the project root.
    pub glob_pattern: String,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            glob_pattern: DEFAULT_GLOB_PATTERN.to_string(),
        }
    }
}

/// Outcome of candidate discovery, consumed by the runner and telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCandidatesResult {
    /// Selected component paths, relative to the project root.
    pub candidates: Vec<String>,
    /// Files matching the glob after exclusions.
    pub match_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_complexity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentCandidatesResult {
    /// A failed discovery with no candidates.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Exclusion list applied to enumerated paths.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    directories: Vec<String>,
    file_patterns: Vec<Pattern>,
    example_patterns: Vec<Pattern>,
    extra_patterns: Vec<Pattern>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExclusionRules {
    /// The built-in exclusion list.
    pub fn standard() -> Self {
        Self {
            directories: EXCLUDED_DIRECTORIES.iter().map(|d| d.to_string()).collect(),
            file_patterns: compile_static(EXCLUDED_FILE_PATTERNS),
            example_patterns: compile_static(EXAMPLE_COMPONENT_PATTERNS),
            extra_patterns: Vec::new(),
        }
    }

    /// Add project-specific glob patterns matched against the relative path.
    pub fn with_extra_patterns<I, S>(mut self, patterns: I) -> DiscoveryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            for expanded in expand_braces(pattern.as_ref()) {
                let compiled =
                    Pattern::new(&expanded).map_err(|e| DiscoveryError::InvalidPattern {
                        pattern: expanded.clone(),
                        reason: e.msg.to_string(),
                    })?;
                self.extra_patterns.push(compiled);
            }
        }
        Ok(self)
    }

    /// Whether a root-relative, `/`-separated path is excluded.
    pub fn is_excluded(&self, relative: &str) -> bool {
        let mut segments: Vec<&str> = relative.split('/').collect();
        let Some(file_name) = segments.pop() else {
            return true;
        };

        if segments
            .iter()
            .any(|segment| self.directories.iter().any(|d| d == segment))
        {
            return true;
        }

        if self.file_patterns.iter().any(|p| p.matches(file_name)) {
            return true;
        }

        let in_stories_dir = segments
            .last()
            .is_some_and(|parent| parent.eq_ignore_ascii_case("stories"));
        let insensitive = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        if in_stories_dir
            && self
                .example_patterns
                .iter()
                .any(|p| p.matches_with(file_name, insensitive))
        {
            return true;
        }

        self.extra_patterns.iter().any(|p| p.matches(relative))
    }
}

fn compile_static(patterns: &[&str]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect()
}

/// Finds component candidates in a project.
pub struct CandidateDiscovery {
    root: PathBuf,
    enumerator: Arc<dyn FileEnumerator>,
    source: Arc<dyn FileSource>,
    analyzer: Arc<dyn ComponentAnalyzer>,
    exclusions: ExclusionRules,
}

impl CandidateDiscovery {
    /// Create a discovery rooted at `root` using the filesystem and the
    /// lexical component analyzer.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            enumerator: Arc::new(WalkEnumerator),
            source: Arc::new(FsFileSource),
            analyzer: Arc::new(LexicalAnalyzer),
            exclusions: ExclusionRules::standard(),
        }
    }

    /// Replace the file enumeration source.
    pub fn with_enumerator(mut self, enumerator: Arc<dyn FileEnumerator>) -> Self {
        self.enumerator = enumerator;
        self
    }

    /// Replace the file content source.
    pub fn with_source(mut self, source: Arc<dyn FileSource>) -> Self {
        self.source = source;
        self
    }

    /// Replace the component analyzer.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ComponentAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Replace the exclusion rules.
    pub fn with_exclusions(mut self, exclusions: ExclusionRules) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Get the project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerate, filter and select candidates.
    pub async fn discover(&self, options: &DiscoveryOptions) -> ComponentCandidatesResult {
        let files = match self
            .enumerator
            .enumerate(&self.root, &options.glob_pattern)
            .await
        {
            Ok(files) => files,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "candidate enumeration failed");
                return ComponentCandidatesResult::failed(FIND_CANDIDATES_ERROR);
            }
        };

        let files: Vec<String> = files
            .into_iter()
            .filter(|f| !self.exclusions.is_excluded(f))
            .collect();
        let match_count = files.len();

        if match_count == 0 {
            debug!(pattern = %options.glob_pattern, "no component files matched");
            return ComponentCandidatesResult::default();
        }

        let selector =
            CandidateSelector::new(self.source.as_ref(), self.analyzer.as_ref(), &self.root);
        let selection = selector.select(&files, options.sample_size).await;

        info!(
            match_count,
            analyzed = selection.analyzed_count,
            selected = selection.candidates.len(),
            "candidate discovery finished"
        );

        ComponentCandidatesResult {
            candidates: selection.candidates,
            match_count,
            analyzed_count: Some(selection.analyzed_count),
            avg_complexity: Some(selection.avg_complexity),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::selector::tests::{component, RecordingSource};
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    struct FailingEnumerator;

    #[async_trait]
    impl FileEnumerator for FailingEnumerator {
        async fn enumerate(&self, _root: &Path, _glob: &str) -> DiscoveryResult<Vec<String>> {
            Err(DiscoveryError::Walk("permission denied".to_string()))
        }
    }

    struct FixedEnumerator(Vec<String>);

    #[async_trait]
    impl FileEnumerator for FixedEnumerator {
        async fn enumerate(&self, _root: &Path, _glob: &str) -> DiscoveryResult<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    #[test]
    fn test_exclusions_cover_build_and_test_files() {
        let rules = ExclusionRules::standard();
        for excluded in [
            "node_modules/lib/A.tsx",
            "packages/ui/dist/A.tsx",
            "src/__mocks__/A.tsx",
            "build/A.jsx",
            "storybook-static/A.jsx",
            ".git/hooks/A.tsx",
            "src/A.test.tsx",
            "src/A.spec.jsx",
            "src/A.stories.tsx",
            "src/types.d.tsx",
            "vite.config.tsx",
            "src/stories/Button.tsx",
            "src/stories/HEADER.jsx",
            "stories/page.tsx",
        ] {
            assert!(rules.is_excluded(excluded), "{excluded} should be excluded");
        }
    }

    #[test]
    fn test_exclusions_keep_regular_components() {
        let rules = ExclusionRules::standard();
        for kept in [
            "src/components/Button.tsx",
            "src/Header.jsx",
            "src/builder/Form.tsx",
            "src/Distance.tsx",
        ] {
            assert!(!rules.is_excluded(kept), "{kept} should be kept");
        }
    }

    #[test]
    fn test_extra_exclusion_patterns() {
        let rules = ExclusionRules::standard()
            .with_extra_patterns(["legacy/**", "**/*.{generated,gen}.tsx"])
            .expect("patterns");
        assert!(rules.is_excluded("legacy/old/Widget.tsx"));
        assert!(rules.is_excluded("src/Icons.generated.tsx"));
        assert!(rules.is_excluded("src/Icons.gen.tsx"));
        assert!(!rules.is_excluded("src/Widget.tsx"));
    }

    #[tokio::test]
    async fn test_zero_matches_is_not_an_error() {
        let temp_dir = TempDir::new().expect("temp dir");
        write(temp_dir.path(), "src/util.ts", "export const x = 1;");
        write(temp_dir.path(), "src/Card.stories.tsx", "export default {};");

        let result = CandidateDiscovery::new(temp_dir.path())
            .discover(&DiscoveryOptions::default())
            .await;

        assert!(result.candidates.is_empty());
        assert_eq!(result.match_count, 0);
        assert!(result.error.is_none());
        assert!(result.analyzed_count.is_none());
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_reported() {
        let discovery =
            CandidateDiscovery::new("/project").with_enumerator(Arc::new(FailingEnumerator));

        let result = discovery.discover(&DiscoveryOptions::default()).await;

        assert_eq!(result.error.as_deref(), Some(FIND_CANDIDATES_ERROR));
        assert_eq!(result.match_count, 0);
        assert!(result.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_discovers_candidates_from_filesystem() {
        let temp_dir = TempDir::new().expect("temp dir");
        write(temp_dir.path(), "src/Simple.tsx", &component(0));
        write(temp_dir.path(), "src/Complex.tsx", &component(40));
        write(temp_dir.path(), "src/Simple.test.tsx", &component(0));
        write(temp_dir.path(), "src/NotAComponent.tsx", "export const x = 1;");

        let options = DiscoveryOptions {
            sample_size: 1,
            glob_pattern: DEFAULT_GLOB_PATTERN.to_string(),
        };
        let result = CandidateDiscovery::new(temp_dir.path())
            .discover(&options)
            .await;

        assert_eq!(result.match_count, 3);
        assert_eq!(result.candidates, vec!["src/Simple.tsx"]);
        assert_eq!(result.avg_complexity, Some(0.04));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_hidden_directories_are_not_matched() {
        let temp_dir = TempDir::new().expect("temp dir");
        write(
            temp_dir.path(),
            ".storybook/preview.tsx",
            "const preview = { decorators: [(Story) => <Story />] };\nexport default preview;\n",
        );
        write(temp_dir.path(), "src/Alert.tsx", &component(0));

        let result = CandidateDiscovery::new(temp_dir.path())
            .discover(&DiscoveryOptions::default())
            .await;

        assert_eq!(result.match_count, 1);
        assert_eq!(result.candidates, vec!["src/Alert.tsx"]);
    }

    #[tokio::test]
    async fn test_excluded_files_are_never_read() {
        let files = vec![
            "src/A.stories.tsx".to_string(),
            "src/A.tsx".to_string(),
        ];
        let source = Arc::new(RecordingSource::default().with_file("/p/src/A.tsx", &component(0)));
        let discovery = CandidateDiscovery::new("/p")
            .with_enumerator(Arc::new(FixedEnumerator(files)))
            .with_source(source.clone());

        let result = discovery.discover(&DiscoveryOptions::default()).await;

        assert_eq!(result.match_count, 1);
        assert_eq!(result.candidates, vec!["src/A.tsx"]);
        assert_eq!(source.read_count(), 1);
    }

    #[test]
    fn test_result_serializes_camel_case_without_empty_fields() {
        let result = ComponentCandidatesResult::default();
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json, serde_json::json!({"candidates": [], "matchCount": 0}));
    }
}
