//! Action resolution for fired rules

use crate::models::{Action, Rule};

/// The actions a fired rule asks for, verbatim and in declared order
///
/// Required parameters were checked when the rule was loaded. Merging
/// actions across rules is the engine's job, not this one's.
pub fn resolve(rule: &Rule) -> &[Action] {
    rule.actions()
}
