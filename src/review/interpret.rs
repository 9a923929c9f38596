//! Response interpretation: raw model JSON → validated findings + verdict.
//!
//! This is the single boundary where the model's output is trusted or
//! repaired. Everything downstream works with typed records:
//! - line numbers are verified against the current file content and
//!   cleared (marked unverified) when out of bounds;
//! - findings without a verbatim code reference are dropped outright;
//! - title-duplicate findings collapse;
//! - the reported out-of-scope file list passes through the scope filter;
//! - the compliance verdict is recomputed from the merged evidence, not
//!   taken from the model on faith.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Category;
use crate::errors::InterpretError;
use crate::scope::{ScopeFilter, TicketClassifier};

/// Context window (lines on each side) for rendered snippets.
const SNIPPET_PAD_LINES: usize = 3;

/// Finding severity, ordered by weight.
///
/// Unknown strings from the model repair to `Warning` at the parse
/// boundary instead of failing the whole response.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "info" => Severity::Info,
            "error" => Severity::Error,
            "critical" | "blocker" => Severity::Critical,
            _ => Severity::Warning,
        }
    }
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Error and critical findings gate the verdict and the summary detail.
    pub fn is_blocking(self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

/// Final review decision for a file or the whole PR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    ChangesRequested,
}

/// Coverage status for an acceptance criterion or subtask.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoverageStatus {
    Covered,
    Partial,
    Missing,
}

impl CoverageStatus {
    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "covered" | "met" | "done" | "complete" | "yes" => CoverageStatus::Covered,
            "partial" | "partially" | "in_progress" => CoverageStatus::Partial,
            _ => CoverageStatus::Missing,
        }
    }

    fn rank(self) -> u8 {
        match self {
            CoverageStatus::Covered => 0,
            CoverageStatus::Partial => 1,
            CoverageStatus::Missing => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoverageStatus::Covered => "covered",
            CoverageStatus::Partial => "partial",
            CoverageStatus::Missing => "missing",
        }
    }
}

/// One validated issue reported by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub suggested_fix: Option<String>,
    /// Verified 1-based line in the current file, if any.
    pub line: Option<u32>,
    /// True when the model supplied a line that failed verification.
    pub line_unverified: bool,
    /// Verbatim code the finding refers to. Always non-empty; findings
    /// without one never survive interpretation.
    pub code_reference: String,
    /// Context window around the validated line, for rendering.
    pub snippet: Option<String>,
}

/// Acceptance-criteria checklist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptanceCheck {
    pub criterion: String,
    pub status: CoverageStatus,
    pub evidence: Option<String>,
}

/// Subtask coverage entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskCoverage {
    pub key: String,
    pub status: CoverageStatus,
}

/// Ticket-compliance summary for one file or the whole PR.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub matches_requirements: bool,
    pub missing_criteria: Vec<String>,
    /// Out-of-scope files, post scope filter.
    pub out_of_scope_files: Vec<String>,
    pub acceptance_criteria: Vec<AcceptanceCheck>,
    pub subtask_coverage: Vec<SubtaskCoverage>,
    pub verdict: Option<Verdict>,
}

impl ComplianceVerdict {
    /// Whether any subtask is not fully covered.
    fn has_missing_subtasks(&self) -> bool {
        self.subtask_coverage
            .iter()
            .any(|s| s.status != CoverageStatus::Covered)
    }
}

/// Interpreted result for a single file.
#[derive(Debug, Clone)]
pub struct FileReview {
    pub findings: Vec<Finding>,
    pub verdict: ComplianceVerdict,
}

// ----- raw (untrusted) shapes, repaired at this boundary only -----

#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(default)]
    findings: Vec<RawFinding>,
    compliance: Option<RawCompliance>,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    severity: Option<Severity>,
    category: Option<Category>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    suggested_fix: Option<String>,
    line: Option<i64>,
    code_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCompliance {
    matches_requirements: Option<bool>,
    #[serde(default)]
    missing_criteria: Vec<String>,
    #[serde(default)]
    out_of_scope_files: Vec<String>,
    #[serde(default)]
    acceptance_criteria: Vec<RawCriterion>,
    #[serde(default)]
    subtask_coverage: Vec<RawSubtaskCoverage>,
    verdict: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCriterion {
    #[serde(default)]
    criterion: String,
    #[serde(default)]
    status: String,
    evidence: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubtaskCoverage {
    #[serde(default)]
    key: String,
    #[serde(default)]
    status: String,
}

/// Strips markdown fences and surrounding chatter, keeping the outermost
/// JSON object. Models routinely wrap JSON in ```json ... ``` blocks.
fn strip_to_json(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => raw,
    }
}

/// Interprets a raw model response for one file.
///
/// Parse/schema failures bubble up as `InterpretError`; the caller treats
/// them as a per-file soft failure (zero findings, run continues).
pub fn interpret<C: TicketClassifier>(
    raw: &str,
    file_content: Option<&str>,
    scope: &ScopeFilter<C>,
    ticket_text: Option<&str>,
) -> Result<FileReview, InterpretError> {
    let parsed: RawReview = serde_json::from_str(strip_to_json(raw))?;

    let lines: Vec<&str> = file_content.map(|c| c.lines().collect()).unwrap_or_default();
    let total_lines = lines.len() as i64;

    let mut findings = Vec::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    for f in parsed.findings {
        if f.title.trim().is_empty() {
            debug!("interpret: dropped untitled finding");
            continue;
        }
        // Drop-without-reference invariant: unverifiable issues never
        // reach output.
        let code_reference = match f.code_reference {
            Some(r) if !r.trim().is_empty() => r,
            _ => {
                debug!("interpret: dropped finding without code reference: {}", f.title);
                continue;
            }
        };
        // Dedup by title within the file; first occurrence wins.
        if !seen_titles.insert(f.title.trim().to_lowercase()) {
            debug!("interpret: collapsed duplicate title: {}", f.title);
            continue;
        }

        let (line, line_unverified) = match f.line {
            Some(l) if l >= 1 && l <= total_lines => (Some(l as u32), false),
            Some(l) => {
                debug!(
                    "interpret: cleared unverifiable line {} (file has {} lines)",
                    l, total_lines
                );
                (None, true)
            }
            None => (None, false),
        };
        let snippet = line.map(|l| snippet_around(&lines, l));

        findings.push(Finding {
            severity: f.severity.unwrap_or(Severity::Warning),
            category: f.category.unwrap_or(Category::Unknown),
            title: f.title,
            description: f.description,
            suggested_fix: f.suggested_fix.filter(|s| !s.trim().is_empty()),
            line,
            line_unverified,
            code_reference,
            snippet,
        });
    }

    let verdict = build_verdict(parsed.compliance, &findings, scope, ticket_text);
    Ok(FileReview { findings, verdict })
}

/// Builds the per-file compliance verdict from the raw compliance block
/// plus the validated findings.
fn build_verdict<C: TicketClassifier>(
    raw: Option<RawCompliance>,
    findings: &[Finding],
    scope: &ScopeFilter<C>,
    ticket_text: Option<&str>,
) -> ComplianceVerdict {
    let raw = raw.unwrap_or(RawCompliance {
        matches_requirements: None,
        missing_criteria: Vec::new(),
        out_of_scope_files: Vec::new(),
        acceptance_criteria: Vec::new(),
        subtask_coverage: Vec::new(),
        verdict: None,
    });

    // Scope filtering applies only to the out-of-scope list, never to
    // other finding categories.
    let out_of_scope_files =
        scope.filter_out_of_scope(ticket_text.unwrap_or(""), &raw.out_of_scope_files);

    let acceptance_criteria: Vec<AcceptanceCheck> = raw
        .acceptance_criteria
        .into_iter()
        .filter(|c| !c.criterion.trim().is_empty())
        .map(|c| AcceptanceCheck {
            criterion: c.criterion,
            status: CoverageStatus::parse(&c.status),
            evidence: c.evidence.filter(|e| !e.trim().is_empty()),
        })
        .collect();

    let subtask_coverage: Vec<SubtaskCoverage> = raw
        .subtask_coverage
        .into_iter()
        .filter(|s| !s.key.trim().is_empty())
        .map(|s| SubtaskCoverage {
            status: CoverageStatus::parse(&s.status),
            key: s.key,
        })
        .collect();

    let mut verdict = ComplianceVerdict {
        matches_requirements: raw
            .matches_requirements
            .unwrap_or(raw.missing_criteria.is_empty()),
        missing_criteria: raw.missing_criteria,
        out_of_scope_files,
        acceptance_criteria,
        subtask_coverage,
        verdict: None,
    };

    let model_requested_changes = raw
        .verdict
        .map(|v| {
            let v = v.to_lowercase();
            v.contains("request") || v.contains("change")
        })
        .unwrap_or(false);
    let blocking_compliance_finding = findings.iter().any(|f| {
        f.severity.is_blocking()
            && matches!(f.category, Category::Requirement | Category::Scope)
    });

    verdict.verdict = Some(
        if model_requested_changes
            || !verdict.missing_criteria.is_empty()
            || !verdict.out_of_scope_files.is_empty()
            || verdict.has_missing_subtasks()
            || blocking_compliance_finding
        {
            Verdict::ChangesRequested
        } else {
            Verdict::Approve
        },
    );
    verdict
}

/// Fenced-snippet source: a window of numbered lines centered on `line`.
fn snippet_around(lines: &[&str], line: u32) -> String {
    let idx = (line as usize).saturating_sub(1);
    let start = idx.saturating_sub(SNIPPET_PAD_LINES);
    let end = (idx + SNIPPET_PAD_LINES + 1).min(lines.len());
    let mut out = String::new();
    for (i, l) in lines[start..end].iter().enumerate() {
        out.push_str(&format!("{:>4} | {}\n", start + i + 1, l));
    }
    out
}

/// Merges per-file verdicts into one PR-level verdict, deduplicating the
/// aggregated lists; worst coverage status wins per criterion/subtask.
pub fn merge_verdicts(verdicts: &[&ComplianceVerdict]) -> ComplianceVerdict {
    let mut missing: BTreeSet<String> = BTreeSet::new();
    let mut out_of_scope: BTreeSet<String> = BTreeSet::new();
    let mut criteria: Vec<AcceptanceCheck> = Vec::new();
    let mut subtasks: Vec<SubtaskCoverage> = Vec::new();

    for v in verdicts {
        missing.extend(v.missing_criteria.iter().cloned());
        out_of_scope.extend(v.out_of_scope_files.iter().cloned());
        for c in &v.acceptance_criteria {
            match criteria.iter_mut().find(|e| e.criterion == c.criterion) {
                Some(existing) => {
                    if c.status.rank() > existing.status.rank() {
                        existing.status = c.status;
                    }
                    if existing.evidence.is_none() {
                        existing.evidence = c.evidence.clone();
                    }
                }
                None => criteria.push(c.clone()),
            }
        }
        for s in &v.subtask_coverage {
            match subtasks.iter_mut().find(|e| e.key == s.key) {
                Some(existing) => {
                    if s.status.rank() > existing.status.rank() {
                        existing.status = s.status;
                    }
                }
                None => subtasks.push(s.clone()),
            }
        }
    }

    let any_changes_requested = verdicts
        .iter()
        .any(|v| v.verdict == Some(Verdict::ChangesRequested));

    let mut merged = ComplianceVerdict {
        matches_requirements: missing.is_empty(),
        missing_criteria: missing.into_iter().collect(),
        out_of_scope_files: out_of_scope.into_iter().collect(),
        acceptance_criteria: criteria,
        subtask_coverage: subtasks,
        verdict: None,
    };
    merged.verdict = Some(
        if any_changes_requested
            || !merged.missing_criteria.is_empty()
            || !merged.out_of_scope_files.is_empty()
            || merged.has_missing_subtasks()
        {
            Verdict::ChangesRequested
        } else {
            Verdict::Approve
        },
    );
    merged
}
