//! Batch runner
//!
//! Fetches messages, evaluates them in batches, applies the resulting
//! directives and records which (message, rule) pairs were handled.
//! Re-running over the same mailbox is idempotent: pairs already in the
//! processed store are excluded from evaluation, so only rules that have
//! not yet handled a message can act on it.

use anyhow::{Result, bail};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;

use crate::engine::{self, Directive, MessageError, RuleMatch};
use crate::eval::EvalContext;
use crate::executor::ActionExecutor;
use crate::models::{MessageId, MessageRecord, RuleSet};
use crate::processed::ProcessedStore;
use crate::settings::DEFAULT_BATCH_SIZE;
use crate::supplier::{FetchWindow, MessageSupplier};

/// How a run is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Messages evaluated per engine call
    pub batch_size: usize,
    /// Evaluate each batch on the rayon thread pool
    pub parallel: bool,
    pub window: FetchWindow,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: false,
            window: FetchWindow::all(),
        }
    }
}

/// Statistics from a run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Number of messages returned by the supplier
    pub messages_fetched: usize,
    /// Number of messages evaluated without error
    pub messages_evaluated: usize,
    /// Number of (message, rule) pairs that fired
    pub rules_matched: usize,
    /// Number of directives the executor carried out
    pub directives_applied: usize,
    /// Number of (message, rule) pairs passed over as already processed
    pub pairs_skipped: usize,
    /// Number of directives the executor rejected
    pub directives_failed: usize,
    /// Number of messages that could not be evaluated
    pub evaluation_errors: usize,
    /// Duration of the run
    pub duration_ms: u64,
}

/// What happened to one directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveStatus {
    Applied,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveReport {
    #[serde(flatten)]
    pub directive: Directive,
    pub status: DirectiveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full result of [`process_messages`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub stats: RunStats,
    pub directives: Vec<DirectiveReport>,
    /// Pairs found in the processed store
    pub skipped: Vec<RuleMatch>,
    pub errors: Vec<MessageError>,
}

/// Run `rules` over the messages `supplier` returns for the window
///
/// Pairs already in `store` are excluded before evaluation. A pair that
/// fired is marked processed unless one of its surviving directives failed
/// to apply. Executor failures are reported per directive; store and
/// supplier failures abort the run.
pub fn process_messages(
    supplier: &dyn MessageSupplier,
    rules: &RuleSet,
    executor: &dyn ActionExecutor,
    store: &dyn ProcessedStore,
    options: &RunOptions,
    ctx: &EvalContext,
) -> Result<RunReport> {
    if options.batch_size == 0 {
        bail!("batch_size must be greater than zero");
    }

    let start = std::time::Instant::now();
    let mut report = RunReport::default();

    // 1. Fetch
    let messages = supplier.fetch(&options.window)?;
    report.stats.messages_fetched = messages.len();
    if let Some(at) = store.last_processed()? {
        info!("Processed store last updated at {}", at);
    }
    info!(
        "Processing {} messages against {} rules",
        messages.len(),
        rules.len()
    );

    // 2. Evaluate and apply batch by batch
    for (index, batch) in messages.chunks(options.batch_size).enumerate() {
        let excluded = processed_pairs(batch, rules, store)?;
        let outcome = if options.parallel {
            engine::run_parallel_excluding(batch, rules, ctx, &excluded)
        } else {
            engine::run_excluding(batch, rules, ctx, &excluded)
        };

        report.stats.messages_evaluated += batch.len() - outcome.errors.len();
        report.stats.evaluation_errors += outcome.errors.len();
        report.stats.rules_matched += outcome.matches.len();
        report.stats.pairs_skipped += outcome.skipped.len();

        let mut failed: HashSet<(MessageId, String)> = HashSet::new();
        for directive in outcome.directives {
            let entry = match executor.apply(&directive) {
                Ok(()) => {
                    report.stats.directives_applied += 1;
                    DirectiveReport {
                        directive,
                        status: DirectiveStatus::Applied,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to apply {} to message {}: {:#}",
                        directive.action, directive.message_id, e
                    );
                    report.stats.directives_failed += 1;
                    failed.insert((directive.message_id.clone(), directive.rule.clone()));
                    DirectiveReport {
                        directive,
                        status: DirectiveStatus::Failed,
                        error: Some(format!("{:#}", e)),
                    }
                }
            };
            report.directives.push(entry);
        }

        // 3. Record handled pairs
        for fired in outcome.matches {
            let key = (fired.message_id, fired.rule);
            if failed.contains(&key) {
                continue;
            }
            store.mark_processed(&key.0, &key.1, ctx.now)?;
        }

        report.skipped.extend(outcome.skipped);
        report.errors.extend(outcome.errors);
        info!("Finished batch {} ({} messages)", index + 1, batch.len());
    }

    report.stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Run complete: {} applied, {} failed, {} pairs skipped, {} evaluation errors in {}ms",
        report.stats.directives_applied,
        report.stats.directives_failed,
        report.stats.pairs_skipped,
        report.stats.evaluation_errors,
        report.stats.duration_ms
    );
    Ok(report)
}

/// Pairs in `batch` the store already holds
fn processed_pairs(
    batch: &[MessageRecord],
    rules: &RuleSet,
    store: &dyn ProcessedStore,
) -> Result<HashSet<RuleMatch>> {
    let mut pairs = HashSet::new();
    for message in batch {
        for rule in rules.rules() {
            if store.is_processed(&message.id, rule.identifier())? {
                pairs.insert(RuleMatch::new(message.id.clone(), rule.identifier()));
            }
        }
    }
    Ok(pairs)
}
