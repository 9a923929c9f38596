//! Prompt-assembly and compliance-evaluation pipeline for an AI
//! pull-request review bot.
//!
//! Single high-level function to run the whole pipeline for one PR:
//!
//! 1) **Filter** — drop non-reviewable files (lockfiles, minified/binary
//!    assets, build output, env files) and collect PR-level stats.
//! 2) **Per file** — assemble `ReviewContext`, build the fixed-order
//!    prompt, call the opaque model seam, interpret the JSON response
//!    into validated findings and a compliance verdict. Every per-file
//!    failure is caught, logged, and recorded; the run never aborts.
//! 3) **Aggregate** — merge per-file verdicts into one PR-level verdict
//!    and hand the result to the renderer (inline comment payloads plus
//!    one summary document carrying the bot's identity marker).
//!
//! The pipeline uses `tracing` for debug logging and avoids `async-trait`
//! and heap trait objects (no `Box<dyn ...>`). The model transport and the
//! scope classifier are generic seams with concrete defaults.
//!
//! Platform API clients, ticket/requirements readers, and CLI plumbing
//! live outside this crate; they hand in `ReviewInputs` and post whatever
//! the renderer produces.

pub mod changes;
pub mod config;
pub mod context;
pub mod errors;
pub mod render;
pub mod review;
pub mod rules;
pub mod scope;

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

// Convenience re-exports for downstream users.
pub use changes::{ChangeKind, FileChange, PrStats};
pub use config::{Category, ReviewConfig, SecurityLevel, Strictness};
pub use context::{ReviewContext, Subtask, Ticket};
pub use render::{BOT_MARKER, InlineComment, final_verdict, render_inline_comment, render_summary};
pub use review::interpret::{ComplianceVerdict, Finding, Severity, Verdict};
pub use review::llm::{HttpModelClient, ModelClient, ModelConfig};
pub use rules::RuleRegistry;
pub use scope::{KeywordClassifier, ScopeFilter, TicketClassifier};

/// Everything the external collaborators hand to one run.
#[derive(Debug, Clone, Default)]
pub struct ReviewInputs {
    /// Changed files from the diff source, provider order preserved.
    pub changes: Vec<FileChange>,
    /// Current full content per path at the PR head. Deleted files and
    /// paths missing here are reviewed from the diff alone.
    pub file_contents: HashMap<String, String>,
    /// Ticket record, if the tracker reader found one.
    pub ticket: Option<Ticket>,
    /// Aggregated requirements-document text, if any was discovered.
    pub requirements: Option<String>,
}

/// One file that could not be reviewed; surfaced in the summary counts.
#[derive(Debug, Clone)]
pub struct ReviewFailure {
    pub path: String,
    pub reason: String,
}

/// Interpreted review for one file.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub change: FileChange,
    pub findings: Vec<Finding>,
    pub verdict: ComplianceVerdict,
}

/// The full run's output, ready for rendering.
#[derive(Debug, Clone)]
pub struct ReviewRunResult {
    pub files: Vec<FileResult>,
    pub failures: Vec<ReviewFailure>,
    /// Paths excluded by the reviewable-file filter.
    pub skipped_files: Vec<String>,
    pub merged_verdict: ComplianceVerdict,
    pub ticket: Option<Ticket>,
    /// False when no requirements document was available; the summary
    /// states so explicitly.
    pub requirements_used: bool,
    /// Mandatory categories force-enabled over the project config.
    pub forced_categories: Vec<Category>,
    pub generated_at: DateTime<Utc>,
}

/// Runs the whole review pipeline for one PR, sequentially per file.
///
/// Never fails as a whole: per-file errors become `failures` entries and
/// the summary is always producible from the returned result.
pub async fn run_review<M: ModelClient, C: TicketClassifier>(
    inputs: ReviewInputs,
    cfg: &ReviewConfig,
    registry: &RuleRegistry,
    scope: &ScopeFilter<C>,
    model: &M,
) -> ReviewRunResult {
    let t0 = Instant::now();
    let (kept, skipped_files) = changes::filter_reviewable(inputs.changes);
    let stats = PrStats::collect(&kept);
    info!(
        "run: start files={} skipped={} ticket={}",
        kept.len(),
        skipped_files.len(),
        inputs
            .ticket
            .as_ref()
            .map(|t| t.key.as_str())
            .unwrap_or("none")
    );

    let mut files: Vec<FileResult> = Vec::with_capacity(kept.len());
    let mut failures: Vec<ReviewFailure> = Vec::new();

    for change in kept {
        let ctx = ReviewContext {
            file_content: inputs
                .file_contents
                .get(&change.path)
                .map(|s| s.as_str()),
            ticket: inputs.ticket.as_ref(),
            requirements: inputs.requirements.as_deref(),
            stats: &stats,
        };

        match review::review_file(&change, &ctx, cfg, registry, scope, model).await {
            Ok(review) => files.push(FileResult {
                change,
                findings: review.findings,
                verdict: review.verdict,
            }),
            Err(e) => {
                // Per-file soft failure: zero findings, run continues.
                warn!("run: review failed path={} reason={}", change.path, e);
                failures.push(ReviewFailure {
                    path: change.path,
                    reason: e.to_string(),
                });
            }
        }
    }

    let merged_verdict =
        review::interpret::merge_verdicts(&files.iter().map(|f| &f.verdict).collect::<Vec<_>>());

    info!(
        "run: done reviewed={} failed={} verdict={:?} in {} ms",
        files.len(),
        failures.len(),
        merged_verdict.verdict,
        t0.elapsed().as_millis()
    );

    ReviewRunResult {
        files,
        failures,
        skipped_files,
        merged_verdict,
        requirements_used: inputs.requirements.is_some(),
        ticket: inputs.ticket,
        forced_categories: cfg.forced_categories.clone(),
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ModelError;

    const LOGIN_PY: &str =
        "from flask import request\ndef login():\n    user = request.json\n    return issue_token(user)\n";

    /// Scripted model: answers per file path mentioned in the prompt.
    struct ScriptedModel;

    impl ModelClient for ScriptedModel {
        async fn evaluate(&self, prompt: &str, _system: &str) -> Result<String, ModelError> {
            if prompt.contains("File: src/controllers/login.py") {
                Ok(r#"```json
{
  "findings": [
    {
      "severity": "error",
      "category": "requirement",
      "title": "Login endpoint is not rate-limited",
      "description": "The acceptance criteria require rate limiting; none is present.",
      "suggested_fix": "Apply a limiter decorator to login()",
      "line": 2,
      "code_reference": "def login():"
    }
  ],
  "compliance": {
    "matches_requirements": false,
    "missing_criteria": ["must rate-limit login attempts"],
    "out_of_scope_files": ["src/controllers/login.py", "docs/CHANGELOG.md"],
    "acceptance_criteria": [
      {"criterion": "must rate-limit login attempts", "status": "missing",
       "evidence": "no limiter around login()"}
    ],
    "subtask_coverage": [],
    "verdict": "request_changes"
  }
}
```"#
                .to_string())
            } else {
                Ok(r#"{"findings": [], "compliance": {"matches_requirements": true,
                    "verdict": "approve"}}"#
                    .to_string())
            }
        }
    }

    /// Fails for one path, succeeds (empty review) for the rest.
    struct FlakyModel;

    impl ModelClient for FlakyModel {
        async fn evaluate(&self, prompt: &str, _system: &str) -> Result<String, ModelError> {
            if prompt.contains("File: src/unlucky.py") {
                Err(ModelError::Timeout)
            } else {
                Ok(r#"{"findings": []}"#.to_string())
            }
        }
    }

    fn auth_inputs() -> ReviewInputs {
        let login = FileChange::from_diff(
            "src/controllers/login.py",
            ChangeKind::Added,
            "@@ -0,0 +1,4 @@\n+from flask import request\n+def login():\n+    user = request.json\n+    return issue_token(user)\n".to_string(),
        );
        let changelog = FileChange::from_diff(
            "docs/CHANGELOG.md",
            ChangeKind::Modified,
            "@@ -1,1 +1,2 @@\n context\n+## added login endpoint\n".to_string(),
        );
        let mut file_contents = HashMap::new();
        file_contents.insert("src/controllers/login.py".to_string(), LOGIN_PY.to_string());
        file_contents.insert(
            "docs/CHANGELOG.md".to_string(),
            "# Changelog\n## added login endpoint\n".to_string(),
        );

        ReviewInputs {
            changes: vec![login, changelog],
            file_contents,
            ticket: Some(Ticket {
                key: "AUTH-12".into(),
                summary: "add login endpoint".into(),
                description: "New endpoint for user login.".into(),
                acceptance_criteria: vec!["must rate-limit login attempts".into()],
                subtasks: vec![],
                url: None,
            }),
            requirements: None,
        }
    }

    #[tokio::test]
    async fn auth_scenario_end_to_end() {
        let cfg = ReviewConfig::default();
        let registry = RuleRegistry::new("/nonexistent/rules");
        let scope = ScopeFilter::default();

        let run = run_review(auth_inputs(), &cfg, &registry, &scope, &ScriptedModel).await;

        assert_eq!(run.files.len(), 2);
        assert!(run.failures.is_empty());

        // login.py: requirement finding with validated line + code ref.
        let login = run
            .files
            .iter()
            .find(|f| f.change.path == "src/controllers/login.py")
            .unwrap();
        assert_eq!(login.findings.len(), 1);
        let f = &login.findings[0];
        assert_eq!(f.severity, Severity::Error);
        assert_eq!(f.category, Category::Requirement);
        assert_eq!(f.line, Some(2));
        assert_eq!(f.code_reference, "def login():");

        // Scope filter: login.py reclassified as in scope (auth family),
        // the changelog stays out of scope (always-exclude doc pattern).
        assert_eq!(
            login.verdict.out_of_scope_files,
            vec!["docs/CHANGELOG.md".to_string()]
        );

        assert_eq!(final_verdict(&run), Verdict::ChangesRequested);
        assert!(
            run.merged_verdict
                .missing_criteria
                .contains(&"must rate-limit login attempts".to_string())
        );

        // Renderable both ways.
        let inline = render_inline_comment(f, &login.change.path).unwrap();
        assert_eq!(inline.line, 2);
        let summary = render_summary(&run);
        assert!(summary.contains("Login endpoint is not rate-limited"));
        assert!(summary.contains("- [missing] must rate-limit login attempts"));
    }

    #[tokio::test]
    async fn per_file_failure_is_isolated() {
        let unlucky = FileChange::from_diff(
            "src/unlucky.py",
            ChangeKind::Modified,
            "@@ -1,1 +1,1 @@\n-a\n+b\n".to_string(),
        );
        let fine = FileChange::from_diff(
            "src/fine.py",
            ChangeKind::Modified,
            "@@ -1,1 +1,1 @@\n-a\n+b\n".to_string(),
        );
        let inputs = ReviewInputs {
            changes: vec![unlucky, fine],
            ..Default::default()
        };

        let cfg = ReviewConfig::default();
        let registry = RuleRegistry::new("/nonexistent/rules");
        let scope = ScopeFilter::default();
        let run = run_review(inputs, &cfg, &registry, &scope, &FlakyModel).await;

        assert_eq!(run.files.len(), 1);
        assert_eq!(run.files[0].change.path, "src/fine.py");
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].path, "src/unlucky.py");
        assert!(run.failures[0].reason.contains("timed out"));

        // Summary still renders, reporting partial success as partial.
        let summary = render_summary(&run);
        assert!(summary.contains("Review failures: 1"));
    }

    #[tokio::test]
    async fn lockfiles_never_reach_the_model() {
        struct PanicModel;
        impl ModelClient for PanicModel {
            async fn evaluate(&self, prompt: &str, _s: &str) -> Result<String, ModelError> {
                assert!(!prompt.contains("package-lock.json"));
                Ok(r#"{"findings": []}"#.to_string())
            }
        }

        let lock = FileChange::from_diff(
            "package-lock.json",
            ChangeKind::Modified,
            "@@ -1,1 +1,1 @@\n-a\n+b\n".to_string(),
        );
        let inputs = ReviewInputs {
            changes: vec![lock],
            ..Default::default()
        };
        let cfg = ReviewConfig::default();
        let registry = RuleRegistry::new("/nonexistent/rules");
        let scope = ScopeFilter::default();
        let run = run_review(inputs, &cfg, &registry, &scope, &PanicModel).await;

        assert!(run.files.is_empty());
        assert_eq!(run.skipped_files, vec!["package-lock.json".to_string()]);
    }
}
