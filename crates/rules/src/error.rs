//! Error types for rule loading and evaluation

use crate::models::{Field, MessageId, Predicate};

/// A rule document that cannot be turned into a rule set
///
/// Raised at load time. Nothing is evaluated when loading fails.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to parse rules document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rule '{rule}': {defect}")]
    InvalidRule { rule: String, defect: RuleDefect },

    #[error("Duplicate rule name: {0}")]
    DuplicateName(String),

    #[error("Duplicate rule identifier: {0}")]
    DuplicateIdentifier(String),
}

impl ConfigurationError {
    pub fn invalid(rule: &str, defect: RuleDefect) -> Self {
        ConfigurationError::InvalidRule {
            rule: rule.to_string(),
            defect,
        }
    }
}

/// What is wrong with a single rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleDefect {
    #[error("rule name is empty")]
    EmptyName,

    #[error("rule identifier is empty")]
    EmptyIdentifier,

    #[error("rule has no conditions")]
    EmptyConditions,

    #[error("predicate '{predicate}' is not supported on field '{field}'")]
    UnsupportedPredicate { field: Field, predicate: Predicate },

    #[error("invalid value '{value}' for field '{field}': {reason}")]
    InvalidValue {
        field: Field,
        value: String,
        reason: String,
    },

    #[error("action '{action}' requires '{parameter}'")]
    MissingParameter {
        action: &'static str,
        parameter: &'static str,
    },
}

/// A message whose fields cannot be evaluated against a condition
///
/// Scoped to one message; the rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("message {message} has no valid received timestamp (condition: {condition})")]
    MissingTimestamp { message: MessageId, condition: String },
}
