//! Normalized per-file change records and the reviewable-file filter.
//!
//! The platform layer (GitHub/Bitbucket REST glue, outside this crate)
//! hands us one `FileChange` per changed file. This module:
//! - derives added/removed line counts from the unified diff when the
//!   platform didn't supply them;
//! - filters out files that should never reach the model (lockfiles,
//!   minified/binary assets, build output, env files, binary patches);
//! - aggregates PR-level stats shared by every per-file prompt.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of change applied to a file in the PR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
        }
    }
}

/// One file's diff in the PR. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Repo-relative path (new path for renames).
    pub path: String,
    pub kind: ChangeKind,
    /// Raw unified diff text for this file, verbatim from the provider.
    pub unified_diff: String,
    pub added_lines: u32,
    pub removed_lines: u32,
}

impl FileChange {
    /// Build a change record, deriving line counts from the diff text.
    pub fn from_diff(path: impl Into<String>, kind: ChangeKind, unified_diff: String) -> Self {
        let (added_lines, removed_lines) = diff_stats(&unified_diff);
        Self {
            path: path.into(),
            kind,
            unified_diff,
            added_lines,
            removed_lines,
        }
    }
}

/// Counts added/removed lines in a unified diff.
///
/// Skips `+++`/`---` file headers and `\ No newline at end of file`
/// marker lines; everything else follows the one-char prefix convention.
pub fn diff_stats(diff: &str) -> (u32, u32) {
    let mut added = 0u32;
    let mut removed = 0u32;
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") || line.starts_with("\\ ") {
            continue;
        }
        if line.starts_with('+') {
            added += 1;
        } else if line.starts_with('-') {
            removed += 1;
        }
    }
    (added, removed)
}

/// Simple heuristic to detect binary patches or messages in unified diff.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}

lazy_static! {
    static ref LOCKFILE_RE: Regex = Regex::new(
        r"(?i)(^|/)(package-lock\.json|yarn\.lock|pnpm-lock\.yaml|cargo\.lock|poetry\.lock|pipfile\.lock|composer\.lock|gemfile\.lock|go\.sum)$"
    )
    .unwrap();
    static ref ASSET_RE: Regex = Regex::new(
        r"(?i)\.(min\.js|min\.css|map|png|jpe?g|gif|ico|svgz|pdf|zip|gz|tar|jar|woff2?|ttf|eot|so|dylib|dll|exe|bin|wasm)$"
    )
    .unwrap();
    static ref BUILD_DIR_RE: Regex =
        Regex::new(r"(^|/)(dist|build|target|out|node_modules|vendor|__pycache__|\.gradle)(/|$)")
            .unwrap();
    static ref ENV_FILE_RE: Regex = Regex::new(r"(?i)(^|/)\.env(\.[A-Za-z0-9_.-]+)?$").unwrap();
}

/// Whether a path is eligible for review at all.
///
/// Lockfiles, minified/binary assets, build output directories and env
/// files are excluded by filename pattern before any prompt is built.
pub fn is_reviewable(path: &str) -> bool {
    !(LOCKFILE_RE.is_match(path)
        || ASSET_RE.is_match(path)
        || BUILD_DIR_RE.is_match(path)
        || ENV_FILE_RE.is_match(path))
}

/// Drops non-reviewable changes, returning (kept, skipped paths).
pub fn filter_reviewable(changes: Vec<FileChange>) -> (Vec<FileChange>, Vec<String>) {
    let mut kept = Vec::with_capacity(changes.len());
    let mut skipped = Vec::new();
    for c in changes {
        if !is_reviewable(&c.path) || looks_like_binary_patch(&c.unified_diff) {
            debug!("changes: skip non-reviewable path={}", c.path);
            skipped.push(c.path);
        } else {
            kept.push(c);
        }
    }
    (kept, skipped)
}

/// Aggregate PR-level stats shared across per-file prompts.
#[derive(Debug, Clone, Default)]
pub struct PrStats {
    pub file_count: usize,
    pub total_added: u32,
    pub total_removed: u32,
    /// Paths of every reviewable file in the PR, in provider order.
    pub sibling_paths: Vec<String>,
}

impl PrStats {
    pub fn collect(changes: &[FileChange]) -> Self {
        let mut s = PrStats {
            file_count: changes.len(),
            ..Default::default()
        };
        for c in changes {
            s.total_added += c.added_lines;
            s.total_removed += c.removed_lines;
            s.sibling_paths.push(c.path.clone());
        }
        s
    }

    /// Total changed lines across the whole PR.
    pub fn total_lines(&self) -> u32 {
        self.total_added + self.total_removed
    }
}
