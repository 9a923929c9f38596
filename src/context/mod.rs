//! Per-file review context and budgeted truncation.
//!
//! Ticket and requirements data arrive from external readers (JIRA fetch,
//! SRS discovery live outside this crate); only their shape matters here.
//! `ReviewContext` bundles everything one prompt needs for one file and is
//! discarded once the prompt is built.

use serde::{Deserialize, Serialize};

use crate::changes::PrStats;

/// Marker appended whenever a passage is hard-truncated to budget.
pub const TRUNCATION_MARKER: &str = "… (truncated)";

/// A ticket subtask as reported by the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub key: String,
    pub summary: String,
}

/// Ticket record produced by the external tracker reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub key: String,
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub url: Option<String>,
}

impl Ticket {
    /// Free-text blob the scope classifier matches against.
    pub fn scope_text(&self) -> String {
        format!("{} {}", self.summary, self.description)
    }
}

/// Aggregated input for one file's prompt.
#[derive(Debug, Clone)]
pub struct ReviewContext<'a> {
    /// Current full file content at the PR head (none for deleted files).
    pub file_content: Option<&'a str>,
    pub ticket: Option<&'a Ticket>,
    /// Aggregated requirements-document text, if any was discovered.
    pub requirements: Option<&'a str>,
    pub stats: &'a PrStats,
}

/// Hard-truncates `text` to `budget` characters, appending an explicit
/// marker. Text within budget is passed through byte-identical.
pub fn truncate_with_marker(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut out: String = text.chars().take(budget).collect();
    out.push('\n');
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through_unmodified() {
        let text = "short passage";
        assert_eq!(truncate_with_marker(text, 100), text);
        // Exactly at budget is still unmodified.
        assert_eq!(truncate_with_marker(text, text.len()), text);
    }

    #[test]
    fn long_text_is_cut_and_marked() {
        let text = "x".repeat(500);
        let out = truncate_with_marker(&text, 100);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(out.starts_with(&"x".repeat(100)));
        assert!(out.len() < text.len());
    }

    #[test]
    fn scope_text_joins_summary_and_description() {
        let t = Ticket {
            key: "AUTH-12".into(),
            summary: "add login endpoint".into(),
            description: "must rate-limit login attempts".into(),
            acceptance_criteria: vec![],
            subtasks: vec![],
            url: None,
        };
        let blob = t.scope_text();
        assert!(blob.contains("login endpoint"));
        assert!(blob.contains("rate-limit"));
    }
}
