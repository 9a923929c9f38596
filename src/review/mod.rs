//! Per-file review orchestration: context → prompt → model → interpret.
//!
//! One file is one unit of work. Any failure inside the unit (model
//! timeout, bad JSON) surfaces as an error to the run loop, which logs it,
//! records a failure entry, and moves on to the next file.

pub mod interpret;
pub mod llm;
pub mod prompt;

use std::time::Instant;

use tracing::debug;

use crate::changes::FileChange;
use crate::config::ReviewConfig;
use crate::context::ReviewContext;
use crate::errors::ReviewResult;
use crate::rules::RuleRegistry;
use crate::scope::{ScopeFilter, TicketClassifier};
use interpret::FileReview;
use llm::ModelClient;

/// Reviews a single file end to end.
pub async fn review_file<M: ModelClient, C: TicketClassifier>(
    change: &FileChange,
    ctx: &ReviewContext<'_>,
    cfg: &ReviewConfig,
    registry: &RuleRegistry,
    scope: &ScopeFilter<C>,
    model: &M,
) -> ReviewResult<FileReview> {
    let t0 = Instant::now();

    let prompt_text = prompt::build_prompt(change, ctx, cfg, registry);
    debug!(
        "review: prompt built path={} chars={}",
        change.path,
        prompt_text.chars().count()
    );

    let raw = model.evaluate(&prompt_text, prompt::SYSTEM_MESSAGE).await?;
    debug!(
        "review: model replied path={} chars={} ({} ms)",
        change.path,
        raw.chars().count(),
        t0.elapsed().as_millis()
    );

    let ticket_text = ctx.ticket.map(|t| t.scope_text());
    let review = interpret::interpret(
        &raw,
        ctx.file_content,
        scope,
        ticket_text.as_deref(),
    )?;
    debug!(
        "review: interpreted path={} findings={} verdict={:?}",
        change.path,
        review.findings.len(),
        review.verdict.verdict
    );
    Ok(review)
}
