//! File content and file enumeration sources used by discovery.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use tracing::debug;

use super::DiscoveryError;

/// Provider of file contents for the candidate selector.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Reads files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileSource;

#[async_trait]
impl FileSource for FsFileSource {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

/// Source of project-relative file paths matching a glob pattern.
#[async_trait]
pub trait FileEnumerator: Send + Sync {
    /// List files under `root` whose relative path matches `glob_pattern`.
    ///
    /// Returned paths are relative to `root`, use `/` separators and are
    /// sorted so the selector sees files in a stable order.
    async fn enumerate(&self, root: &Path, glob_pattern: &str)
        -> Result<Vec<String>, DiscoveryError>;
}

/// Walks the project tree with the `ignore` walker.
///
/// Hidden files and `.gitignore` rules are not applied here; the exclusion
/// rules in [`super::ExclusionRules`] decide what is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkEnumerator;

#[async_trait]
impl FileEnumerator for WalkEnumerator {
    async fn enumerate(
        &self,
        root: &Path,
        glob_pattern: &str,
    ) -> Result<Vec<String>, DiscoveryError> {
        let root = root.to_path_buf();
        let patterns = compile_patterns(glob_pattern)?;

        tokio::task::spawn_blocking(move || walk_matching(&root, &patterns))
            .await
            .map_err(|e| DiscoveryError::Walk(e.to_string()))?
    }
}

fn walk_matching(root: &Path, patterns: &[Pattern]) -> Result<Vec<String>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::MissingRoot(root.to_path_buf()));
    }

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut matches = Vec::new();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .filter_entry(|entry| entry.file_name() != "node_modules" && entry.file_name() != ".git")
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| DiscoveryError::Walk(e.to_string()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let Some(relative) = relative_slash_path(root, entry.path()) else {
            continue;
        };
        if patterns.iter().any(|p| p.matches_with(&relative, options)) {
            matches.push(relative);
        }
    }

    matches.sort();
    debug!(root = %root.display(), count = matches.len(), "enumerated files");
    Ok(matches)
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative: PathBuf = path.strip_prefix(root).ok()?.to_path_buf();
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Compile a glob pattern, expanding one level of `{a,b}` alternation.
pub fn compile_patterns(glob_pattern: &str) -> Result<Vec<Pattern>, DiscoveryError> {
    expand_braces(glob_pattern)
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| DiscoveryError::InvalidPattern {
                pattern: p.clone(),
                reason: e.msg.to_string(),
            })
        })
        .collect()
}

/// Expand brace groups (`**/*.{tsx,jsx}`) into plain glob patterns.
///
/// Groups are expanded left to right; nested groups are not supported.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close) = pattern[open..].find('}').map(|i| open + i) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    pattern[open + 1..close]
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}
