//! Prompt assembly: one structured request per changed file.
//!
//! The section order is fixed and deliberate — it encodes priority. When
//! the model has to drop material because of its own output limits, the
//! earlier sections must survive: persona and priority directive first,
//! then requirements/ticket context, then the change itself, then rules,
//! and the output contract last so it is the freshest instruction.

use crate::changes::FileChange;
use crate::config::ReviewConfig;
use crate::context::{ReviewContext, truncate_with_marker};
use crate::rules::RuleRegistry;

/// System message accompanying every prompt.
pub const SYSTEM_MESSAGE: &str = "You are a precise senior code reviewer. \
Respond with a single JSON object and nothing else.";

/// Fixed reviewer persona. Never varies by configuration.
const PERSONA: &str = "You are an exacting senior software engineer reviewing \
one file of a pull request. You report only defects you can point to in the \
code; you never speculate, and you never praise.";

/// Fixed priority-order directive. The model must honor this ranking when
/// it has to drop findings due to its own output-size limits.
const PRIORITY_DIRECTIVE: &str = "Report findings in this strict priority \
order, dropping from the bottom if you run out of output space:\n\
1. Violations of the ticket or requirements context\n\
2. Security vulnerabilities\n\
3. Authorization and access-control issues\n\
4. Critical bugs\n\
5. Performance issues with measurable impact";

/// The exact output contract the model must return.
const OUTPUT_SCHEMA: &str = r#"Return exactly one JSON object with this shape:
{
  "findings": [
    {
      "severity": "error" | "critical",
      "category": "secrets" | "authorization" | "security" | "error_leakage"
                | "requirement" | "scope" | "bug" | "performance" | "quality",
      "title": "short unique title",
      "description": "what is wrong and why it matters",
      "suggested_fix": "concrete change",
      "line": <1-based line in the current file, omit if unsure>,
      "code_reference": "verbatim code copied from the file"
    }
  ],
  "compliance": {
    "matches_requirements": true | false,
    "missing_criteria": ["unmet acceptance criterion", ...],
    "out_of_scope_files": ["path", ...],
    "acceptance_criteria": [
      {"criterion": "...", "status": "covered" | "partial" | "missing", "evidence": "..."}
    ],
    "subtask_coverage": [{"key": "...", "status": "covered" | "partial" | "missing"}],
    "verdict": "approve" | "request_changes"
  }
}

Hard constraints:
- Only error and critical severities are wanted; omit lesser issues.
- Omit the line number rather than guess it.
- Never report findings inside disabled (commented-out) code.
- Every finding must carry a verbatim code_reference or be omitted entirely.
- Collapse findings with duplicate titles into one."#;

/// Builds the full prompt for one file, in the fixed section order.
pub fn build_prompt(
    change: &FileChange,
    ctx: &ReviewContext<'_>,
    cfg: &ReviewConfig,
    registry: &RuleRegistry,
) -> String {
    let mut s = String::new();

    // 1) Persona, 2) priority order.
    s.push_str(PERSONA);
    s.push_str("\n\n");
    s.push_str(PRIORITY_DIRECTIVE);
    s.push('\n');

    // 3) Requirements context (budgeted).
    if let Some(req) = ctx.requirements {
        s.push_str("\n# Requirements context\n");
        s.push_str(&truncate_with_marker(req, cfg.limits.requirements_budget));
        s.push('\n');
    }

    // 4) Ticket context.
    if let Some(ticket) = ctx.ticket {
        s.push_str("\n# Ticket context\n");
        s.push_str(&format!("{}: {}\n", ticket.key, ticket.summary));
        if !ticket.description.is_empty() {
            s.push_str(&ticket.description);
            s.push('\n');
        }
        if !ticket.acceptance_criteria.is_empty() {
            s.push_str("Acceptance criteria:\n");
            for c in &ticket.acceptance_criteria {
                s.push_str(&format!("- {c}\n"));
            }
        }
        if !ticket.subtasks.is_empty() {
            s.push_str("Subtasks:\n");
            for st in &ticket.subtasks {
                s.push_str(&format!("- {}: {}\n", st.key, st.summary));
            }
        }
    }

    // 5) Change metadata + optional size warning.
    s.push_str("\n# Change under review\n");
    s.push_str(&format!(
        "File: {} ({}, +{}/-{})\n",
        change.path,
        change.kind.as_str(),
        change.added_lines,
        change.removed_lines
    ));
    s.push_str(&format!(
        "All changed files in this PR ({} files, {} changed lines total): {}\n",
        ctx.stats.file_count,
        ctx.stats.total_lines(),
        ctx.stats.sibling_paths.join(", ")
    ));
    if ctx.stats.file_count > cfg.limits.large_pr_files
        || ctx.stats.total_lines() > cfg.limits.large_pr_lines
    {
        s.push_str(
            "Warning: this pull request is unusually large; prioritize the most severe findings.\n",
        );
    }

    // 6) Diff, verbatim.
    s.push_str("\n# Unified diff\n```diff\n");
    s.push_str(&change.unified_diff);
    if !change.unified_diff.ends_with('\n') {
        s.push('\n');
    }
    s.push_str("```\n");

    // 7) Current file content (budgeted).
    s.push_str("\n# Current file content\n");
    match ctx.file_content {
        Some(content) => {
            s.push_str("```\n");
            s.push_str(&truncate_with_marker(content, cfg.limits.file_content_budget));
            if !s.ends_with('\n') {
                s.push('\n');
            }
            s.push_str("```\n");
        }
        None => s.push_str("(file deleted in this PR)\n"),
    }

    // 8) Enabled rule modules, in registry order.
    let mut wrote_rules_header = false;
    for cat in &cfg.enabled_categories {
        if let Some(text) = registry.get_rule(*cat) {
            if !wrote_rules_header {
                s.push_str("\n# Review rules\n");
                wrote_rules_header = true;
            }
            s.push_str(&format!("## Rule: {}\n{}\n", cat.as_str(), text));
        }
    }

    // 9) Project-specific custom rules.
    if !cfg.custom_rules.is_empty() {
        s.push_str("\n# Project-specific rules\n");
        for rule in &cfg.custom_rules {
            s.push_str(&format!("- {rule}\n"));
        }
    }

    // 10) Output contract.
    s.push_str("\n# Output\n");
    s.push_str(OUTPUT_SCHEMA);
    s.push('\n');

    s
}
