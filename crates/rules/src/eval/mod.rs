//! Condition evaluation and rule matching
//!
//! Pure functions of (message, rule, reference instant). Nothing in here
//! allocates shared state, so evaluation is safe from any number of threads.

mod condition;
mod matcher;

pub use condition::evaluate;
pub use matcher::matches;

use chrono::{DateTime, Utc};

/// Inputs to evaluation that are not part of the message or the rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    /// Reference instant for relative date predicates
    pub now: DateTime<Utc>,
}

impl EvalContext {
    /// Evaluate relative to a fixed instant
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Evaluate relative to the current time
    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}
