//! Rules crate - Mailbox rule engine
//!
//! This crate provides:
//! - Domain models (MessageRecord, Rule, Condition, Action)
//! - Rule document loading with full validation up front
//! - Condition evaluation and rule matching
//! - The engine that turns messages and rules into directives
//! - Gmail message normalization, suppliers and executors
//! - Processed-message tracking and a batch runner
//!
//! The evaluation core does no I/O. Suppliers, executors and stores are
//! traits so a run can be wired to a real mailbox or to memory.

pub mod engine;
pub mod error;
pub mod eval;
pub mod executor;
pub mod gmail;
pub mod loader;
pub mod models;
pub mod processed;
pub mod resolve;
pub mod runner;
pub mod settings;
pub mod supplier;

pub use engine::{
    Directive, MessageError, RuleMatch, RunOutcome, run, run_excluding, run_parallel,
    run_parallel_excluding,
};
pub use error::{ConfigurationError, EvaluationError, RuleDefect};
pub use eval::{EvalContext, evaluate, matches};
pub use executor::{ActionExecutor, DryRunExecutor, InMemoryMailbox};
pub use gmail::normalize_message;
pub use loader::{load_rules_file, parse_rules};
pub use models::{
    Action, Combinator, Condition, DateUnit, EmailAddress, Field, MessageId,
    MessageRecord, Predicate, Rule, RuleSet,
};
pub use processed::{InMemoryProcessedStore, JsonFileProcessedStore, ProcessedStore};
pub use resolve::resolve;
pub use runner::{DirectiveReport, DirectiveStatus, RunOptions, RunReport, RunStats, process_messages};
pub use settings::{Settings, locate_rules_file};
pub use supplier::{FetchWindow, GmailDumpSupplier, InMemorySupplier, MessageSupplier};
