//! Rule document loading
//!
//! The document is a JSON object with a `rules` list:
//!
//! ```json
//! {
//!   "rules": [{
//!     "identifier": "interview-v1",
//!     "name": "Interview Emails",
//!     "predicate": "all",
//!     "conditions": [
//!       { "field": "from", "predicate": "contains", "value": "example.com" },
//!       { "field": "received_date", "predicate": "less_than", "value": "2", "unit": "days" }
//!     ],
//!     "actions": [
//!       { "type": "mark_as_read" },
//!       { "type": "move_message", "destination": "Inbox" }
//!     ]
//!   }]
//! }
//! ```
//!
//! Unknown keys, fields, predicates and action types are rejected while
//! parsing; everything else is checked by the validation pass that builds the
//! [`RuleSet`].

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;

use crate::error::{ConfigurationError, RuleDefect};
use crate::models::{Action, Combinator, Condition, DateUnit, Field, Predicate, Rule, RuleSet};

/// Top-level rule document
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesDocument {
    pub rules: Vec<RuleEntry>,
}

/// One rule as written in the document
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    /// Permanent identifier; defaults to the name
    pub identifier: Option<String>,
    pub name: String,
    #[serde(alias = "combinator")]
    pub predicate: Combinator,
    #[serde(default)]
    pub conditions: Vec<ConditionEntry>,
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// One condition as written in the document
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionEntry {
    pub field: Field,
    pub predicate: Predicate,
    pub value: Literal,
    pub unit: Option<DateUnit>,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Condition values may be written as strings or bare integers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Text(String),
    Integer(i64),
}

impl Literal {
    fn into_string(self) -> String {
        match self {
            Literal::Text(s) => s,
            Literal::Integer(n) => n.to_string(),
        }
    }
}

/// One action as written in the document
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionEntry {
    MarkAsRead,
    MarkAsUnread,
    MoveMessage {
        #[serde(default)]
        destination: Option<String>,
    },
}

impl RulesDocument {
    /// Parse a document without validating it
    pub fn parse(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate every rule, active or not, and keep the active ones
    pub fn into_rule_set(self) -> Result<RuleSet, ConfigurationError> {
        let mut active = Vec::with_capacity(self.rules.len());
        let mut rules = Vec::with_capacity(self.rules.len());

        for entry in self.rules {
            active.push(entry.active);
            rules.push(entry.into_rule()?);
        }

        let all = RuleSet::new(rules)?;
        let mut flags = active.into_iter();
        let set = all.retain(|rule| {
            let keep = flags.next().unwrap_or(true);
            if !keep {
                debug!("Skipping inactive rule '{}'", rule.name());
            }
            keep
        });
        Ok(set)
    }
}

impl RuleEntry {
    fn into_rule(self) -> Result<Rule, ConfigurationError> {
        let name = self.name;
        let defect = |defect: RuleDefect| ConfigurationError::invalid(&name, defect);

        let conditions = self
            .conditions
            .into_iter()
            .map(|c| {
                Condition::from_parts(
                    c.field,
                    c.predicate,
                    c.value.into_string(),
                    c.unit,
                    c.case_sensitive,
                )
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(defect)?;

        let actions = self
            .actions
            .into_iter()
            .map(|a| match a {
                ActionEntry::MarkAsRead => Ok(Action::MarkAsRead),
                ActionEntry::MarkAsUnread => Ok(Action::MarkAsUnread),
                ActionEntry::MoveMessage { destination } => {
                    Action::move_to(destination.unwrap_or_default())
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(defect)?;

        let identifier = self.identifier.unwrap_or_else(|| name.clone());
        Rule::with_identifier(identifier, name, self.predicate, conditions, actions)
    }
}

/// Parse and validate a rule document
pub fn parse_rules(json: &str) -> Result<RuleSet, ConfigurationError> {
    RulesDocument::parse(json)?.into_rule_set()
}

/// Load and validate a rule document from disk
pub fn load_rules_file(path: &Path) -> Result<RuleSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
    let rules = parse_rules(&content)
        .with_context(|| format!("Invalid rules file: {}", path.display()))?;

    info!("Loaded {} rules from {}", rules.len(), path.display());
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalContext, evaluate};
    use crate::models::MessageRecord;

    const INTERVIEW_RULES: &str = r#"{
        "rules": [{
            "identifier": "interview-v1",
            "name": "Interview Emails",
            "predicate": "all",
            "conditions": [
                { "field": "from", "predicate": "contains", "value": "example.com" },
                { "field": "subject", "predicate": "contains", "value": "Interview" }
            ],
            "actions": [
                { "type": "mark_as_read" },
                { "type": "move_message", "destination": "Inbox" }
            ]
        }]
    }"#;

    fn expect_defect(json: &str) -> RuleDefect {
        match parse_rules(json).unwrap_err() {
            ConfigurationError::InvalidRule { defect, .. } => defect,
            other => panic!("Expected InvalidRule, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_interview_rules() {
        let rules = parse_rules(INTERVIEW_RULES).unwrap();
        assert_eq!(rules.len(), 1);

        let rule = &rules.rules()[0];
        assert_eq!(rule.identifier(), "interview-v1");
        assert_eq!(rule.name(), "Interview Emails");
        assert_eq!(rule.combinator(), Combinator::All);
        assert_eq!(rule.conditions().len(), 2);
        assert_eq!(
            rule.actions(),
            &[
                Action::MarkAsRead,
                Action::MoveMessage {
                    destination: "Inbox".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_identifier_defaults_to_name() {
        let rules = parse_rules(
            r#"{"rules": [{
                "name": "Receipts",
                "combinator": "any",
                "conditions": [{ "field": "body", "predicate": "contains", "value": "receipt" }],
                "actions": [{ "type": "mark_as_read" }]
            }]}"#,
        )
        .unwrap();
        let rule = &rules.rules()[0];
        assert_eq!(rule.identifier(), "Receipts");
        assert_eq!(rule.combinator(), Combinator::Any);
        assert_eq!(rule.conditions()[0].field(), Field::Message);
    }

    #[test]
    fn test_integer_value_accepted() {
        let rules = parse_rules(
            r#"{"rules": [{
                "name": "Old",
                "predicate": "all",
                "conditions": [{ "field": "received_date", "predicate": "greater_than", "value": 30 }],
                "actions": [{ "type": "move_message", "destination": "Archive" }]
            }]}"#,
        )
        .unwrap();
        assert_eq!(rules.rules()[0].conditions()[0].value(), "30");
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let err = parse_rules(
            r#"{"rules": [{
                "name": "Bad",
                "predicate": "all",
                "conditions": [{ "field": "cc", "predicate": "contains", "value": "x" }],
                "actions": []
            }]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(_)));
    }

    #[test]
    fn test_unknown_action_is_parse_error() {
        let err = parse_rules(
            r#"{"rules": [{
                "name": "Bad",
                "predicate": "all",
                "conditions": [{ "field": "from", "predicate": "contains", "value": "x" }],
                "actions": [{ "type": "forward" }]
            }]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(_)));
    }

    #[test]
    fn test_misspelled_key_is_parse_error() {
        let err = parse_rules(
            r#"{"rules": [{
                "name": "Old",
                "predicate": "all",
                "conditions": [{ "field": "received_date", "predicate": "greater_than", "value": 2, "units": "months" }],
                "actions": []
            }]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(_)));
        assert!(err.to_string().contains("units"));

        let err = parse_rules(
            r#"{"rules": [{
                "name": "Old",
                "predicate": "all",
                "conditions": [{ "field": "from", "predicate": "contains", "value": "x" }],
                "action": [{ "type": "mark_as_read" }]
            }]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse(_)));
    }

    #[test]
    fn test_case_sensitive_from_document() {
        let rules = parse_rules(
            r#"{"rules": [{
                "name": "Shouting",
                "predicate": "all",
                "conditions": [{ "field": "subject", "predicate": "contains", "value": "URGENT", "case_sensitive": true }],
                "actions": [{ "type": "mark_as_unread" }]
            }, {
                "name": "Relaxed",
                "predicate": "all",
                "conditions": [{ "field": "subject", "predicate": "contains", "value": "URGENT" }],
                "actions": [{ "type": "mark_as_unread" }]
            }]}"#,
        )
        .unwrap();
        let ctx = EvalContext::now();
        let strict = &rules.rules()[0].conditions()[0];
        let relaxed = &rules.rules()[1].conditions()[0];
        let upper = MessageRecord::builder("m1").subject("URGENT: reply").build();
        let lower = MessageRecord::builder("m2").subject("urgent: reply").build();

        assert!(evaluate(&upper, strict, &ctx).unwrap());
        assert!(!evaluate(&lower, strict, &ctx).unwrap());
        assert!(evaluate(&lower, relaxed, &ctx).unwrap());
    }

    #[test]
    fn test_matches_regex_from_document() {
        let rules = parse_rules(
            r#"{"rules": [{
                "name": "Invoices",
                "predicate": "any",
                "conditions": [{ "field": "subject", "predicate": "matches_regex", "value": "^invoice #\d+$" }],
                "actions": [{ "type": "move_message", "destination": "Billing" }]
            }]}"#,
        )
        .unwrap();
        let ctx = EvalContext::now();
        let condition = &rules.rules()[0].conditions()[0];
        assert_eq!(condition.predicate(), Predicate::MatchesRegex);

        let hit = MessageRecord::builder("m1").subject("Invoice #1042").build();
        let miss = MessageRecord::builder("m2").subject("Invoice #pending").build();
        assert!(evaluate(&hit, condition, &ctx).unwrap());
        assert!(!evaluate(&miss, condition, &ctx).unwrap());

        let defect = expect_defect(
            r#"{"rules": [{
                "name": "Broken",
                "predicate": "any",
                "conditions": [{ "field": "subject", "predicate": "matches_regex", "value": "(unclosed" }],
                "actions": []
            }]}"#,
        );
        assert!(matches!(
            defect,
            RuleDefect::InvalidValue {
                field: Field::Subject,
                ..
            }
        ));
    }

    #[test]
    fn test_unit_on_text_predicate_rejected() {
        let defect = expect_defect(
            r#"{"rules": [{
                "name": "Bad",
                "predicate": "all",
                "conditions": [{ "field": "subject", "predicate": "contains", "value": "report", "unit": "days" }],
                "actions": []
            }]}"#,
        );
        assert_eq!(
            defect,
            RuleDefect::InvalidValue {
                field: Field::Subject,
                value: "report".to_string(),
                reason: "'unit' only applies to less_than and greater_than".to_string(),
            }
        );
    }

    #[test]
    fn test_unsupported_combination() {
        let defect = expect_defect(
            r#"{"rules": [{
                "name": "Bad",
                "predicate": "all",
                "conditions": [{ "field": "subject", "predicate": "less_than", "value": "2" }],
                "actions": []
            }]}"#,
        );
        assert_eq!(
            defect,
            RuleDefect::UnsupportedPredicate {
                field: Field::Subject,
                predicate: Predicate::LessThan,
            }
        );
    }

    #[test]
    fn test_move_without_destination() {
        let defect = expect_defect(
            r#"{"rules": [{
                "name": "Bad",
                "predicate": "all",
                "conditions": [{ "field": "from", "predicate": "contains", "value": "x" }],
                "actions": [{ "type": "move_message" }]
            }]}"#,
        );
        assert!(matches!(defect, RuleDefect::MissingParameter { .. }));
    }

    #[test]
    fn test_empty_conditions() {
        let defect = expect_defect(
            r#"{"rules": [{ "name": "Bad", "predicate": "any", "actions": [{ "type": "mark_as_read" }] }]}"#,
        );
        assert_eq!(defect, RuleDefect::EmptyConditions);
    }

    #[test]
    fn test_inactive_rules_are_validated_then_dropped() {
        let json = r#"{"rules": [
            { "name": "On", "predicate": "all", "active": true,
              "conditions": [{ "field": "from", "predicate": "contains", "value": "a" }],
              "actions": [{ "type": "mark_as_read" }] },
            { "name": "Off", "predicate": "all", "active": false,
              "conditions": [{ "field": "from", "predicate": "contains", "value": "b" }],
              "actions": [{ "type": "mark_as_read" }] }
        ]}"#;
        let rules = parse_rules(json).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].name(), "On");

        let broken_inactive = r#"{"rules": [
            { "name": "Off", "predicate": "all", "active": false,
              "conditions": [],
              "actions": [] }
        ]}"#;
        assert!(parse_rules(broken_inactive).is_err());
    }

    #[test]
    fn test_duplicate_name_across_active_and_inactive() {
        let json = r#"{"rules": [
            { "name": "Twin", "identifier": "a", "predicate": "all",
              "conditions": [{ "field": "from", "predicate": "contains", "value": "a" }],
              "actions": [] },
            { "name": "Twin", "identifier": "b", "predicate": "all", "active": false,
              "conditions": [{ "field": "from", "predicate": "contains", "value": "b" }],
              "actions": [] }
        ]}"#;
        assert!(matches!(
            parse_rules(json).unwrap_err(),
            ConfigurationError::DuplicateName(_)
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_rules_file(Path::new("/nonexistent/rules.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read rules file"));
    }
}
