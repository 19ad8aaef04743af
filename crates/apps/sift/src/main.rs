//! Sift - apply mailbox rules to a batch of Gmail messages
//!
//! Reads a dump of Gmail API messages, evaluates the configured rules and
//! prints a JSON report of what was (or in dry-run mode, would be) done.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rules::settings::default_state_path;
use rules::{
    ActionExecutor, DirectiveStatus, DryRunExecutor, EvalContext, FetchWindow, GmailDumpSupplier,
    InMemoryMailbox, InMemorySupplier, JsonFileProcessedStore, MessageSupplier, RunOptions,
    RunReport, Settings, load_rules_file, locate_rules_file, process_messages,
};

#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(about = "Apply mailbox rules to Gmail messages", long_about = None)]
struct Cli {
    /// JSON array of Gmail API messages (users.messages.get, format=full)
    #[arg(long)]
    messages: PathBuf,

    /// Rules file (defaults to $SIFT_RULES_FILE, then ~/.config/sift/rules.json)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Only process messages received in the last N days
    #[arg(long)]
    days: Option<u32>,

    /// Process at most this many messages, newest first
    #[arg(long = "max-emails")]
    max_emails: Option<usize>,

    /// Settings file (defaults to ~/.config/sift/settings.json when present)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Processed-message state file (defaults to ~/.config/sift/processed.json)
    ///
    /// Directives are applied to an in-memory copy of the dump, so this file
    /// records what the printed report applied, not changes to a live mailbox.
    /// Point it at a scratch file when trying rules out.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Log and report directives without applying them or saving state
    #[arg(long)]
    dry_run: bool,

    /// Evaluate messages on all cores
    #[arg(long)]
    parallel: bool,
}

#[derive(Serialize)]
struct CliReport<'a> {
    generated_at: DateTime<Utc>,
    rules_file: &'a Path,
    messages_file: &'a Path,
    dry_run: bool,
    #[serde(flatten)]
    report: &'a RunReport,
    /// Labels of every changed message after the run
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, Vec<String>>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let settings = match &cli.settings {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    let rules_path = locate_rules_file(cli.rules.as_deref())?;
    let rule_set = load_rules_file(&rules_path)?;

    let ctx = EvalContext::now();
    let mut window = match cli.days.or(settings.lookback_days) {
        Some(days) => FetchWindow::last_days(days, ctx.now),
        None => FetchWindow::all(),
    };
    if let Some(max) = cli.max_emails.or(settings.max_messages) {
        window = window.limit(max);
    }

    // Fetch once so the mailbox and the run see the same messages
    let fetched = GmailDumpSupplier::new(&cli.messages).fetch(&window)?;
    let mailbox = InMemoryMailbox::from_messages(&fetched);
    let supplier = InMemorySupplier::new(fetched);

    let dry_run = DryRunExecutor::new();
    let executor: &dyn ActionExecutor = if cli.dry_run { &dry_run } else { &mailbox };

    let state_path = match cli.state {
        Some(path) => path,
        None => default_state_path().context("Could not determine config directory")?,
    };
    let store = JsonFileProcessedStore::open(&state_path)?;

    let options = RunOptions {
        batch_size: settings.batch_size,
        parallel: cli.parallel,
        window: FetchWindow::all(),
    };
    let report = process_messages(&supplier, &rule_set, executor, &store, &options, &ctx)?;

    if cli.dry_run {
        info!("Dry run: processed state not saved");
    } else {
        // Records the report's applied directives; the mailbox itself is not persisted
        store.flush()?;
        info!("Saved processed state to {}", store.path().display());
    }

    let labels = if cli.dry_run {
        BTreeMap::new()
    } else {
        report
            .directives
            .iter()
            .filter(|d| d.status == DirectiveStatus::Applied)
            .filter_map(|d| {
                mailbox
                    .labels(&d.directive.message_id)
                    .map(|l| (d.directive.message_id.to_string(), l))
            })
            .collect()
    };

    let output = CliReport {
        generated_at: ctx.now,
        rules_file: &rules_path,
        messages_file: &cli.messages,
        dry_run: cli.dry_run,
        report: &report,
        labels,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
