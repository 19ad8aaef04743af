//! Single condition evaluation

use chrono::{DateTime, Utc};
use log::debug;

use super::EvalContext;
use crate::error::EvaluationError;
use crate::models::{
    AgeOp, Condition, ConditionKind, EmailAddress, Field, InstantOp, MessageRecord, TextTest,
    fold,
};

/// Evaluate one condition against one message
///
/// List fields (`to`, `label`) match when any element matches; the negated
/// predicates hold when no element matches.
pub fn evaluate(
    message: &MessageRecord,
    condition: &Condition,
    ctx: &EvalContext,
) -> Result<bool, EvaluationError> {
    let result = match condition.kind() {
        ConditionKind::Text {
            test,
            negated,
            case_sensitive,
        } => {
            let hit = any_text_value(message, condition.field(), |value| {
                test_text(test, value, *case_sensitive)
            });
            hit != *negated
        }
        ConditionKind::Age { op, threshold } => {
            let age = ctx.now - received_at(message, condition)?;
            match op {
                AgeOp::YoungerThan => age < *threshold,
                AgeOp::OlderThan => age > *threshold,
            }
        }
        ConditionKind::Instant { op, instant } => {
            let received = received_at(message, condition)?;
            match op {
                InstantOp::Before => received < *instant,
                InstantOp::After => received > *instant,
            }
        }
    };

    debug!("Message {}: {} -> {}", message.id, condition, result);
    Ok(result)
}

/// Whether `test` holds for any string a text condition looks at
///
/// Values are borrowed from the message; only a named address allocates,
/// for its "Name <address>" rendering.
fn any_text_value(
    message: &MessageRecord,
    field: Field,
    mut test: impl FnMut(&str) -> bool,
) -> bool {
    match field {
        Field::From => address_matches(&message.from, &mut test),
        Field::To => message.to.iter().any(|a| address_matches(a, &mut test)),
        Field::Subject => test(&message.subject),
        Field::Message => test(&message.body),
        Field::Label => message.label_ids.iter().any(|l| test(l)),
        Field::ReceivedDate => false,
    }
}

/// Tests the bare address, then the display form when the address has a name
fn address_matches(address: &EmailAddress, test: &mut impl FnMut(&str) -> bool) -> bool {
    test(&address.email) || (address.name.is_some() && test(&address.display()))
}

fn test_text(test: &TextTest, value: &str, case_sensitive: bool) -> bool {
    match test {
        TextTest::Literal { op, needle } => op.apply(&fold(value.trim(), case_sensitive), needle),
        TextTest::Pattern(regex) => regex.is_match(value.trim()),
    }
}

fn received_at(
    message: &MessageRecord,
    condition: &Condition,
) -> Result<DateTime<Utc>, EvaluationError> {
    message
        .received_at
        .ok_or_else(|| EvaluationError::MissingTimestamp {
            message: message.id.clone(),
            condition: condition.to_string(),
        })
}
