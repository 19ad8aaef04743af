//! Rule matching over a combinator

use log::debug;

use super::{EvalContext, evaluate};
use crate::error::EvaluationError;
use crate::models::{Combinator, MessageRecord, Rule};

/// Check whether a rule fires for a message
///
/// Conditions are evaluated in declared order. `all` stops at the first
/// false condition and `any` at the first true one, so an error in a
/// condition past that point is never observed.
pub fn matches(
    message: &MessageRecord,
    rule: &Rule,
    ctx: &EvalContext,
) -> Result<bool, EvaluationError> {
    let conditions = rule.conditions();

    let result = match rule.combinator() {
        Combinator::All => {
            let mut all = true;
            for condition in conditions {
                if !evaluate(message, condition, ctx)? {
                    all = false;
                    break;
                }
            }
            all
        }
        Combinator::Any => {
            let mut any = false;
            for condition in conditions {
                if evaluate(message, condition, ctx)? {
                    any = true;
                    break;
                }
            }
            any
        }
    };

    debug!(
        "Rule '{}' ({}) on message {} -> {}",
        rule.name(),
        rule.combinator().as_str(),
        message.id,
        result
    );
    Ok(result)
}
