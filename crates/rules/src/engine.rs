//! Rule engine: turns a batch of messages and a rule set into directives
//!
//! Evaluation of one message never looks at another, so [`run_parallel`]
//! can spread messages over worker threads and still return exactly what
//! [`run`] returns.
//!
//! Callers that track already-handled (message, rule) pairs pass them to
//! [`run_excluding`]. Excluded pairs are never evaluated, so their actions
//! cannot override actions from rules that have not run yet.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::EvaluationError;
use crate::eval::{EvalContext, matches};
use crate::models::{Action, MessageId, MessageRecord, RuleSet};
use crate::resolve::resolve;

/// One action to carry out on one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub message_id: MessageId,
    /// Identifier of the rule that produced the action
    pub rule: String,
    pub action: Action,
}

/// A (message, rule) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RuleMatch {
    pub message_id: MessageId,
    pub rule: String,
}

impl RuleMatch {
    pub fn new(message_id: MessageId, rule: impl Into<String>) -> Self {
        Self {
            message_id,
            rule: rule.into(),
        }
    }
}

/// A message that could not be evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageError {
    pub message_id: MessageId,
    /// Identifier of the rule being evaluated when the error occurred
    pub rule: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: EvaluationError,
}

/// Everything a run produces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Input message order, then rule declaration order
    pub directives: Vec<Directive>,
    /// Rules that fired, in the same order
    pub matches: Vec<RuleMatch>,
    /// Excluded pairs that were passed over without evaluation
    pub skipped: Vec<RuleMatch>,
    /// At most one per message
    pub errors: Vec<MessageError>,
}

/// What one message produced
#[derive(Default)]
struct Evaluated {
    directives: Vec<Directive>,
    fired: Vec<RuleMatch>,
    skipped: Vec<RuleMatch>,
}

type MessageOutcome = Result<Evaluated, MessageError>;

/// Evaluate every message against every rule, in order
pub fn run(messages: &[MessageRecord], rules: &RuleSet, ctx: &EvalContext) -> RunOutcome {
    run_excluding(messages, rules, ctx, &HashSet::new())
}

/// Same as [`run`], with messages evaluated on the rayon thread pool
pub fn run_parallel(messages: &[MessageRecord], rules: &RuleSet, ctx: &EvalContext) -> RunOutcome {
    run_parallel_excluding(messages, rules, ctx, &HashSet::new())
}

/// Like [`run`], but rules are not evaluated for the `excluded` pairs
pub fn run_excluding(
    messages: &[MessageRecord],
    rules: &RuleSet,
    ctx: &EvalContext,
    excluded: &HashSet<RuleMatch>,
) -> RunOutcome {
    let outcomes: Vec<MessageOutcome> = messages
        .iter()
        .map(|message| evaluate_message(message, rules, ctx, excluded))
        .collect();
    assemble(outcomes, rules)
}

/// Parallel form of [`run_excluding`]
pub fn run_parallel_excluding(
    messages: &[MessageRecord],
    rules: &RuleSet,
    ctx: &EvalContext,
    excluded: &HashSet<RuleMatch>,
) -> RunOutcome {
    let outcomes: Vec<MessageOutcome> = messages
        .par_iter()
        .map(|message| evaluate_message(message, rules, ctx, excluded))
        .collect();
    assemble(outcomes, rules)
}

fn evaluate_message(
    message: &MessageRecord,
    rules: &RuleSet,
    ctx: &EvalContext,
    excluded: &HashSet<RuleMatch>,
) -> MessageOutcome {
    let mut result = Evaluated::default();

    for rule in rules.rules() {
        let pair = RuleMatch::new(message.id.clone(), rule.identifier());
        if excluded.contains(&pair) {
            debug!(
                "Rule '{}' already handled message {}",
                rule.name(),
                message.id
            );
            result.skipped.push(pair);
            continue;
        }

        let matched = matches(message, rule, ctx).map_err(|error| MessageError {
            message_id: message.id.clone(),
            rule: rule.identifier().to_string(),
            error,
        })?;

        if !matched {
            continue;
        }

        debug!("Rule '{}' fired for message {}", rule.name(), message.id);
        result.directives.extend(resolve(rule).iter().map(|action| Directive {
            message_id: message.id.clone(),
            rule: rule.identifier().to_string(),
            action: action.clone(),
        }));
        result.fired.push(pair);
    }

    result.directives = merge_conflicts(result.directives);
    Ok(result)
}

/// Drop every action overridden by a later one in the same conflict group
///
/// Input must belong to a single message. Survivors keep their order.
fn merge_conflicts(directives: Vec<Directive>) -> Vec<Directive> {
    let mut last = HashMap::new();
    for (i, directive) in directives.iter().enumerate() {
        last.insert(directive.action.conflict_group(), i);
    }

    directives
        .into_iter()
        .enumerate()
        .filter_map(|(i, directive)| {
            if last.get(&directive.action.conflict_group()) == Some(&i) {
                Some(directive)
            } else {
                debug!(
                    "Dropping {} from rule '{}' for message {}: overridden by a later rule",
                    directive.action, directive.rule, directive.message_id
                );
                None
            }
        })
        .collect()
}

fn assemble(outcomes: Vec<MessageOutcome>, rules: &RuleSet) -> RunOutcome {
    let evaluated = outcomes.len();
    let mut outcome = RunOutcome::default();

    for result in outcomes {
        match result {
            Ok(result) => {
                outcome.directives.extend(result.directives);
                outcome.matches.extend(result.fired);
                outcome.skipped.extend(result.skipped);
            }
            Err(error) => {
                warn!(
                    "Skipping message {} (rule '{}'): {}",
                    error.message_id, error.rule, error.error
                );
                outcome.errors.push(error);
            }
        }
    }

    info!(
        "Evaluated {} messages against {} rules: {} directives, {} skipped pairs, {} errors",
        evaluated,
        rules.len(),
        outcome.directives.len(),
        outcome.skipped.len(),
        outcome.errors.len()
    );
    outcome
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
