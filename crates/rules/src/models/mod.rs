//! Domain models for messages and rules

pub mod labels;
mod message;
mod rule;

pub use message::{EmailAddress, MessageId, MessageRecord, MessageRecordBuilder};
pub use rule::{
    Action, AgeOp, Combinator, Condition, ConditionKind, ConflictGroup, DateUnit, Field,
    FieldKind, InstantOp, Predicate, Rule, RuleSet, TextOp, TextTest,
};
pub(crate) use rule::fold;
