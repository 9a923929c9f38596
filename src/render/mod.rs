//! Rendering: inline comment payloads and the aggregated summary document.
//!
//! Every bot-authored body starts with a fixed marker so a later run can
//! find and delete its own prior output before posting fresh comments.
//! Findings without a validated line never become inline comments; they
//! are carried by the summary instead, so a failed or impossible inline
//! post loses nothing.

use crate::review::interpret::{Finding, Severity, Verdict};
use crate::{FileResult, ReviewRunResult};

use std::collections::HashSet;

/// Fixed identity marker embedded in every bot-authored body.
pub const BOT_MARKER: &str = "<!-- pr-reviewer:generated -->";

fn severity_glyph(s: Severity) -> &'static str {
    match s {
        Severity::Critical => "🛑",
        Severity::Error => "❌",
        Severity::Warning => "⚠️",
        Severity::Info => "ℹ️",
    }
}

/// Inline comment payload for the posting layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineComment {
    pub path: String,
    pub line: u32,
    pub body: String,
}

/// Renders one finding as an inline comment, or `None` when the finding
/// has no validated line (it then lives in the summary only).
pub fn render_inline_comment(finding: &Finding, path: &str) -> Option<InlineComment> {
    if finding.line_unverified {
        return None;
    }
    let line = finding.line?;

    let mut body = String::new();
    body.push_str(BOT_MARKER);
    body.push('\n');
    body.push_str(&format!(
        "{} **{}** `{}` — {}\n\n{}\n",
        severity_glyph(finding.severity),
        finding.severity.as_str(),
        finding.category.as_str(),
        finding.title,
        finding.description
    ));
    if let Some(fix) = &finding.suggested_fix {
        body.push_str(&format!("\n**Suggested fix:** {fix}\n"));
    }
    if let Some(snippet) = &finding.snippet {
        body.push_str("\n```\n");
        body.push_str(snippet);
        body.push_str("```\n");
    }

    Some(InlineComment {
        path: path.to_string(),
        line,
        body,
    })
}

/// Final PR-level verdict.
pub fn final_verdict(run: &ReviewRunResult) -> Verdict {
    run.merged_verdict.verdict.unwrap_or(Verdict::Approve)
}

/// Renders the aggregated markdown summary document.
///
/// Section order is fixed: header, overview counts, compliance, then
/// per-file detail listing only error/critical findings. The document is
/// always producible, even when every file failed.
pub fn render_summary(run: &ReviewRunResult) -> String {
    let mut s = String::new();
    s.push_str(BOT_MARKER);
    s.push_str("\n# AI Code Review\n\n");

    // Header: ticket/requirements provenance.
    match &run.ticket {
        Some(t) => {
            match &t.url {
                Some(url) => s.push_str(&format!("**Ticket:** [{}]({}) — {}\n", t.key, url, t.summary)),
                None => s.push_str(&format!("**Ticket:** {} — {}\n", t.key, t.summary)),
            };
        }
        None => s.push_str(
            "_No ticket context was available; ticket-compliance checking was skipped._\n",
        ),
    }
    if !run.requirements_used {
        s.push_str("_No requirements document was available for this review._\n");
    }
    s.push_str(&format!(
        "_Generated {}_\n",
        run.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    // Overview counts. Partial success is reported as partial.
    let mut by_severity = [0usize; 4];
    for fr in &run.files {
        for f in &fr.findings {
            by_severity[f.severity as usize] += 1;
        }
    }
    s.push_str("\n## Overview\n");
    s.push_str(&format!("- Files reviewed: {}\n", run.files.len()));
    if !run.skipped_files.is_empty() {
        s.push_str(&format!(
            "- Files skipped (non-reviewable): {}\n",
            run.skipped_files.len()
        ));
    }
    if !run.failures.is_empty() {
        s.push_str(&format!(
            "- Review failures: {} ({})\n",
            run.failures.len(),
            run.failures
                .iter()
                .map(|f| f.path.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    s.push_str(&format!(
        "- Findings: {} critical, {} error, {} warning, {} info\n",
        by_severity[Severity::Critical as usize],
        by_severity[Severity::Error as usize],
        by_severity[Severity::Warning as usize],
        by_severity[Severity::Info as usize],
    ));

    // Compliance.
    let v = &run.merged_verdict;
    s.push_str("\n## Compliance\n");
    s.push_str(match final_verdict(run) {
        Verdict::Approve => "**Verdict: Approve** ✅\n",
        Verdict::ChangesRequested => "**Verdict: Changes requested** ❌\n",
    });
    if !v.acceptance_criteria.is_empty() {
        s.push_str("\nAcceptance criteria:\n");
        for c in &v.acceptance_criteria {
            s.push_str(&format!("- [{}] {}", c.status.as_str(), c.criterion));
            if let Some(e) = &c.evidence {
                s.push_str(&format!(" — {e}"));
            }
            s.push('\n');
        }
    }
    if !v.subtask_coverage.is_empty() {
        s.push_str("\nSubtask coverage:\n");
        for st in &v.subtask_coverage {
            s.push_str(&format!("- [{}] {}\n", st.status.as_str(), st.key));
        }
    }
    if !v.missing_criteria.is_empty() {
        s.push_str("\nMissing criteria:\n");
        for m in &v.missing_criteria {
            s.push_str(&format!("- {m}\n"));
        }
    }
    if !v.out_of_scope_files.is_empty() {
        s.push_str("\nOut-of-scope files (after filtering):\n");
        for f in &v.out_of_scope_files {
            s.push_str(&format!("- `{f}`\n"));
        }
    }
    if !run.forced_categories.is_empty() {
        s.push_str(&format!(
            "\n_Mandatory categories force-enabled by policy: {}_\n",
            run.forced_categories
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    // Per-file detail: error/critical only, deduped across files by title.
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut detail = String::new();
    for fr in &run.files {
        let blocking: Vec<&Finding> = fr
            .findings
            .iter()
            .filter(|f| f.severity.is_blocking())
            .filter(|f| seen_titles.insert(f.title.trim().to_lowercase()))
            .collect();
        if blocking.is_empty() {
            continue;
        }
        detail.push_str(&format!("\n### `{}`\n", fr.change.path));
        for f in blocking {
            detail.push_str(&format!(
                "- {} **{}** `{}` {} — {}",
                severity_glyph(f.severity),
                f.severity.as_str(),
                f.category.as_str(),
                f.title,
                f.description
            ));
            match f.line {
                Some(l) => detail.push_str(&format!(" (line {l})\n")),
                None => detail.push('\n'),
            }
        }
    }
    if !detail.is_empty() {
        s.push_str("\n## Findings by file\n");
        s.push_str(&detail);
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeKind, FileChange};
    use crate::config::Category;
    use crate::context::Ticket;
    use crate::review::interpret::ComplianceVerdict;
    use crate::ReviewFailure;
    use chrono::Utc;

    fn finding(title: &str, line: Option<u32>) -> Finding {
        Finding {
            severity: Severity::Error,
            category: Category::Bug,
            title: title.into(),
            description: "broken".into(),
            suggested_fix: Some("fix it".into()),
            line,
            line_unverified: false,
            code_reference: "code".into(),
            snippet: line.map(|_| "   3 | code\n".to_string()),
        }
    }

    fn run_with(files: Vec<FileResult>) -> ReviewRunResult {
        ReviewRunResult {
            files,
            failures: vec![ReviewFailure {
                path: "broken.py".into(),
                reason: "model call timed out".into(),
            }],
            skipped_files: vec!["package-lock.json".into()],
            merged_verdict: ComplianceVerdict {
                matches_requirements: true,
                verdict: Some(Verdict::Approve),
                ..Default::default()
            },
            ticket: None,
            requirements_used: false,
            forced_categories: vec![Category::Secrets],
            generated_at: Utc::now(),
        }
    }

    fn file_result(path: &str, findings: Vec<Finding>) -> FileResult {
        FileResult {
            change: FileChange::from_diff(path, ChangeKind::Modified, String::new()),
            findings,
            verdict: ComplianceVerdict::default(),
        }
    }

    #[test]
    fn inline_comment_requires_validated_line() {
        let ok = finding("t", Some(3));
        let c = render_inline_comment(&ok, "src/a.py").unwrap();
        assert!(c.body.starts_with(BOT_MARKER));
        assert_eq!(c.line, 3);
        assert!(c.body.contains("Suggested fix"));
        assert!(c.body.contains("```"));

        let no_line = finding("t", None);
        assert!(render_inline_comment(&no_line, "src/a.py").is_none());

        let mut unverified = finding("t", Some(3));
        unverified.line_unverified = true;
        unverified.line = None;
        assert!(render_inline_comment(&unverified, "src/a.py").is_none());
    }

    #[test]
    fn summary_carries_marker_and_failure_counts() {
        let run = run_with(vec![file_result("src/a.py", vec![finding("t", Some(3))])]);
        let doc = render_summary(&run);
        assert!(doc.starts_with(BOT_MARKER));
        assert!(doc.contains("Review failures: 1"));
        assert!(doc.contains("broken.py"));
        assert!(doc.contains("Files skipped (non-reviewable): 1"));
        assert!(doc.contains("ticket-compliance checking was skipped"));
        assert!(doc.contains("force-enabled by policy: secrets"));
    }

    #[test]
    fn summary_dedups_titles_across_files() {
        let run = run_with(vec![
            file_result("src/a.py", vec![finding("Same title", Some(1))]),
            file_result("src/b.py", vec![finding("same title", Some(2))]),
        ]);
        let doc = render_summary(&run);
        assert_eq!(doc.matches("Same title").count() + doc.matches("same title").count(), 1);
        // Second file contributed nothing, so its heading is absent.
        assert!(!doc.contains("### `src/b.py`"));
    }

    #[test]
    fn summary_lists_only_blocking_findings() {
        let mut info = finding("minor note", Some(1));
        info.severity = Severity::Info;
        let run = run_with(vec![file_result("src/a.py", vec![info])]);
        let doc = render_summary(&run);
        assert!(!doc.contains("minor note"));
        assert!(doc.contains("1 info"));
    }

    #[test]
    fn summary_renders_ticket_header_when_present() {
        let mut run = run_with(vec![]);
        run.ticket = Some(Ticket {
            key: "AUTH-12".into(),
            summary: "add login endpoint".into(),
            description: String::new(),
            acceptance_criteria: vec![],
            subtasks: vec![],
            url: Some("https://jira.example.com/AUTH-12".into()),
        });
        let doc = render_summary(&run);
        assert!(doc.contains("[AUTH-12](https://jira.example.com/AUTH-12)"));
        assert!(!doc.contains("compliance checking was skipped"));
    }
}
