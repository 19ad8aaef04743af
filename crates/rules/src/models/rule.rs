//! Validated rule model
//!
//! Everything in here is built once at load time and is immutable afterwards.
//! Constructors reject unsupported field/predicate combinations, so evaluation
//! never has to deal with an unknown kind.

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::{ConfigurationError, RuleDefect};

/// Logical join over a rule's conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// AND - every condition must match
    All,
    /// OR - at least one condition must match
    Any,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::All => "all",
            Combinator::Any => "any",
        }
    }
}

/// Message attribute a condition tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    From,
    To,
    Subject,
    #[serde(alias = "body")]
    Message,
    Label,
    #[serde(alias = "date")]
    ReceivedDate,
}

/// Semantic type of a field, which decides the predicates it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A single string
    Text,
    /// Several strings; a match on any element counts
    TextList,
    /// The received instant
    Timestamp,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::From | Field::Subject | Field::Message => FieldKind::Text,
            Field::To | Field::Label => FieldKind::TextList,
            Field::ReceivedDate => FieldKind::Timestamp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::From => "from",
            Field::To => "to",
            Field::Subject => "subject",
            Field::Message => "message",
            Field::Label => "label",
            Field::ReceivedDate => "received_date",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every predicate the rule document may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Contains,
    DoesNotContain,
    Equals,
    DoesNotEqual,
    StartsWith,
    EndsWith,
    MatchesRegex,
    LessThan,
    GreaterThan,
    Before,
    After,
}

impl Predicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::Contains => "contains",
            Predicate::DoesNotContain => "does_not_contain",
            Predicate::Equals => "equals",
            Predicate::DoesNotEqual => "does_not_equal",
            Predicate::StartsWith => "starts_with",
            Predicate::EndsWith => "ends_with",
            Predicate::MatchesRegex => "matches_regex",
            Predicate::LessThan => "less_than",
            Predicate::GreaterThan => "greater_than",
            Predicate::Before => "before",
            Predicate::After => "after",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit for relative date predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateUnit {
    #[default]
    Days,
    /// Approximated as 30 days
    Months,
}

impl DateUnit {
    fn days(&self, amount: i64) -> Option<i64> {
        match self {
            DateUnit::Days => Some(amount),
            DateUnit::Months => amount.checked_mul(30),
        }
    }
}

/// String comparison, after trimming and optional case folding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
}

impl TextOp {
    pub fn apply(&self, haystack: &str, needle: &str) -> bool {
        match self {
            TextOp::Contains => haystack.contains(needle),
            TextOp::Equals => haystack == needle,
            TextOp::StartsWith => haystack.starts_with(needle),
            TextOp::EndsWith => haystack.ends_with(needle),
        }
    }
}

/// How a text condition tests a value
#[derive(Debug, Clone)]
pub enum TextTest {
    /// Literal comparison; the needle is already trimmed (and lowercased
    /// unless the condition is case sensitive)
    Literal { op: TextOp, needle: String },
    /// Regular expression search
    Pattern(Regex),
}

/// Message age comparison against `now`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeOp {
    /// Received less than `threshold` ago
    YoungerThan,
    /// Received more than `threshold` ago
    OlderThan,
}

/// Absolute instant comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantOp {
    Before,
    After,
}

/// Closed set of condition kinds the evaluator knows how to run
#[derive(Debug, Clone)]
pub enum ConditionKind {
    Text {
        test: TextTest,
        /// The negated predicates (`does_not_*`)
        negated: bool,
        case_sensitive: bool,
    },
    Age {
        op: AgeOp,
        threshold: TimeDelta,
    },
    Instant {
        op: InstantOp,
        instant: DateTime<Utc>,
    },
}

/// A single field/predicate/value test
#[derive(Debug, Clone)]
pub struct Condition {
    field: Field,
    predicate: Predicate,
    value: String,
    kind: ConditionKind,
}

impl Condition {
    /// Build a string condition with the default (case-insensitive) comparison
    pub fn new(
        field: Field,
        predicate: Predicate,
        value: impl Into<String>,
    ) -> Result<Self, RuleDefect> {
        Self::from_parts(field, predicate, value.into(), None, false)
    }

    /// Build a relative date condition (`less_than` / `greater_than`)
    pub fn age(predicate: Predicate, amount: i64, unit: DateUnit) -> Result<Self, RuleDefect> {
        Self::from_parts(
            Field::ReceivedDate,
            predicate,
            amount.to_string(),
            Some(unit),
            false,
        )
    }

    /// Validate a field/predicate/value triple into a condition
    pub fn from_parts(
        field: Field,
        predicate: Predicate,
        value: String,
        unit: Option<DateUnit>,
        case_sensitive: bool,
    ) -> Result<Self, RuleDefect> {
        let unsupported = || RuleDefect::UnsupportedPredicate { field, predicate };
        let invalid = |reason: &str| RuleDefect::InvalidValue {
            field,
            value: value.clone(),
            reason: reason.to_string(),
        };

        if unit.is_some() && !matches!(predicate, Predicate::LessThan | Predicate::GreaterThan) {
            return Err(invalid("'unit' only applies to less_than and greater_than"));
        }

        let kind = match field.kind() {
            FieldKind::Text | FieldKind::TextList => {
                let (op, negated) = match predicate {
                    Predicate::Contains => (Some(TextOp::Contains), false),
                    Predicate::DoesNotContain => (Some(TextOp::Contains), true),
                    Predicate::Equals => (Some(TextOp::Equals), false),
                    Predicate::DoesNotEqual => (Some(TextOp::Equals), true),
                    Predicate::StartsWith => (Some(TextOp::StartsWith), false),
                    Predicate::EndsWith => (Some(TextOp::EndsWith), false),
                    Predicate::MatchesRegex => (None, false),
                    _ => return Err(unsupported()),
                };

                let test = match op {
                    Some(op) => TextTest::Literal {
                        op,
                        needle: fold(value.trim(), case_sensitive).into_owned(),
                    },
                    None => {
                        let regex = RegexBuilder::new(value.trim())
                            .case_insensitive(!case_sensitive)
                            .build()
                            .map_err(|e| invalid(&e.to_string()))?;
                        TextTest::Pattern(regex)
                    }
                };

                ConditionKind::Text {
                    test,
                    negated,
                    case_sensitive,
                }
            }
            FieldKind::Timestamp => match predicate {
                Predicate::LessThan | Predicate::GreaterThan => {
                    let amount: i64 = value
                        .trim()
                        .parse()
                        .map_err(|_| invalid("expected a whole number"))?;
                    if amount <= 0 {
                        return Err(invalid("amount must be positive"));
                    }
                    let threshold = unit
                        .unwrap_or_default()
                        .days(amount)
                        .and_then(TimeDelta::try_days)
                        .ok_or_else(|| invalid("amount is out of range"))?;
                    let op = if predicate == Predicate::LessThan {
                        AgeOp::YoungerThan
                    } else {
                        AgeOp::OlderThan
                    };
                    ConditionKind::Age { op, threshold }
                }
                Predicate::Before | Predicate::After => {
                    let instant = parse_instant(value.trim()).ok_or_else(|| {
                        invalid("expected YYYY-MM-DD, YYYY/MM/DD or an RFC 3339 timestamp")
                    })?;
                    let op = if predicate == Predicate::Before {
                        InstantOp::Before
                    } else {
                        InstantOp::After
                    };
                    ConditionKind::Instant { op, instant }
                }
                _ => return Err(unsupported()),
            },
        };

        Ok(Self {
            field,
            predicate,
            value,
            kind,
        })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    /// The value as written in the rule document
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> &ConditionKind {
        &self.kind
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.field, self.predicate, self.value)
    }
}

/// Lowercase unless the comparison is case sensitive
pub(crate) fn fold(s: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.to_lowercase())
    }
}

/// Parse an absolute instant (YYYY-MM-DD, YYYY/MM/DD or RFC 3339)
fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%d", "%Y/%m/%d"].iter().find_map(|fmt| {
        NaiveDate::parse_from_str(input, fmt)
            .ok()?
            .and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt))
    })
}

/// Contradictory actions share a group; within a message the last one wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictGroup {
    ReadState,
    Location,
}

/// What to do with a message when a rule fires
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    MarkAsRead,
    MarkAsUnread,
    MoveMessage { destination: String },
}

impl Action {
    pub fn move_to(destination: impl Into<String>) -> Result<Self, RuleDefect> {
        let destination = destination.into().trim().to_string();
        if destination.is_empty() {
            return Err(RuleDefect::MissingParameter {
                action: "move_message",
                parameter: "destination",
            });
        }
        Ok(Action::MoveMessage { destination })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::MarkAsRead => "mark_as_read",
            Action::MarkAsUnread => "mark_as_unread",
            Action::MoveMessage { .. } => "move_message",
        }
    }

    pub fn conflict_group(&self) -> ConflictGroup {
        match self {
            Action::MarkAsRead | Action::MarkAsUnread => ConflictGroup::ReadState,
            Action::MoveMessage { .. } => ConflictGroup::Location,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::MoveMessage { destination } => write!(f, "move_message({})", destination),
            other => f.write_str(other.name()),
        }
    }
}

/// A named combination of conditions and the actions to take when it fires
#[derive(Debug, Clone)]
pub struct Rule {
    identifier: String,
    name: String,
    combinator: Combinator,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
}

impl Rule {
    /// Create a rule whose identifier is its name
    pub fn new(
        name: impl Into<String>,
        combinator: Combinator,
        conditions: Vec<Condition>,
        actions: Vec<Action>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        Self::with_identifier(name.clone(), name, combinator, conditions, actions)
    }

    pub fn with_identifier(
        identifier: impl Into<String>,
        name: impl Into<String>,
        combinator: Combinator,
        conditions: Vec<Condition>,
        actions: Vec<Action>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let identifier = identifier.into();

        if name.trim().is_empty() {
            return Err(ConfigurationError::invalid(&name, RuleDefect::EmptyName));
        }
        if identifier.trim().is_empty() {
            return Err(ConfigurationError::invalid(&name, RuleDefect::EmptyIdentifier));
        }
        if conditions.is_empty() {
            return Err(ConfigurationError::invalid(&name, RuleDefect::EmptyConditions));
        }

        Ok(Self {
            identifier,
            name,
            combinator,
            conditions,
            actions,
        })
    }

    /// Stable identifier used to remember which messages a rule has processed
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}

/// Ordered, immutable set of rules with unique names and identifiers
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Result<Self, ConfigurationError> {
        let mut names = std::collections::HashSet::new();
        let mut identifiers = std::collections::HashSet::new();

        for rule in &rules {
            if !names.insert(rule.name()) {
                return Err(ConfigurationError::DuplicateName(rule.name().to_string()));
            }
            if !identifiers.insert(rule.identifier()) {
                return Err(ConfigurationError::DuplicateIdentifier(
                    rule.identifier().to_string(),
                ));
            }
        }

        Ok(Self { rules })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Keep only the rules for which `keep` returns true, preserving order
    pub fn retain(mut self, keep: impl FnMut(&Rule) -> bool) -> Self {
        self.rules.retain(keep);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
