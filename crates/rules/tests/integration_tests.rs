//! Integration tests for the rules crate
//!
//! These tests verify the complete flow from rule and message files on
//! disk through evaluation, execution and processed-state persistence.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rules::models::MessageId;
use rules::{
    Action, EvalContext, FetchWindow, GmailDumpSupplier, InMemoryMailbox, JsonFileProcessedStore,
    MessageSupplier, RunOptions, load_rules_file, process_messages, run, run_parallel,
};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

/// Helper to create a Gmail API message as it appears in a dump
fn gmail_message(id: &str, from: &str, subject: &str, age_days: i64) -> serde_json::Value {
    let received = now() - Duration::days(age_days);
    json!({
        "id": id,
        "threadId": format!("t-{}", id),
        "labelIds": ["INBOX", "UNREAD"],
        "snippet": format!("Body of {}", id),
        "internalDate": received.timestamp_millis().to_string(),
        "payload": {
            "mimeType": "multipart/alternative",
            "headers": [
                { "name": "From", "value": from },
                { "name": "To", "value": "me@gmail.com" },
                { "name": "Subject", "value": subject }
            ]
        }
    })
}

fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn write_rules(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("rules.json");
    write_json(
        &path,
        &json!({
            "rules": [
                {
                    "identifier": "interviews",
                    "name": "Interview Emails",
                    "predicate": "all",
                    "conditions": [
                        { "field": "from", "predicate": "contains", "value": "example.com" },
                        { "field": "subject", "predicate": "contains", "value": "Interview" }
                    ],
                    "actions": [
                        { "type": "mark_as_read" },
                        { "type": "move_message", "destination": "Label_Jobs" }
                    ]
                },
                {
                    "identifier": "stale",
                    "name": "Stale Newsletters",
                    "predicate": "all",
                    "conditions": [
                        { "field": "subject", "predicate": "contains", "value": "newsletter" },
                        { "field": "received_date", "predicate": "greater_than", "value": 5, "unit": "days" }
                    ],
                    "actions": [{ "type": "move_message", "destination": "TRASH" }]
                },
                {
                    "identifier": "disabled",
                    "name": "Disabled",
                    "predicate": "any",
                    "conditions": [{ "field": "subject", "predicate": "contains", "value": "" }],
                    "actions": [{ "type": "mark_as_unread" }],
                    "active": false
                }
            ]
        }),
    );
    path
}

fn write_dump(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("messages.json");
    write_json(
        &path,
        &json!([
            gmail_message("m1", "HR <hr@example.com>", "Interview Invitation", 1),
            gmail_message("m2", "news@daily.io", "Weekly Newsletter", 10),
            gmail_message("m3", "news@daily.io", "Weekly Newsletter", 2),
            gmail_message("m4", "hr@example.com", "Lunch?", 0)
        ]),
    );
    path
}

#[test]
fn test_full_run_from_files() {
    let dir = TempDir::new().unwrap();
    let rules = load_rules_file(&write_rules(dir.path())).unwrap();
    assert_eq!(rules.len(), 2);

    let supplier = GmailDumpSupplier::new(write_dump(dir.path()));
    let messages = supplier.fetch(&FetchWindow::all()).unwrap();
    let mailbox = InMemoryMailbox::from_messages(&messages);
    let store = JsonFileProcessedStore::open(dir.path().join("processed.json")).unwrap();
    let ctx = EvalContext::at(now());

    let report = process_messages(
        &supplier,
        &rules,
        &mailbox,
        &store,
        &RunOptions::default(),
        &ctx,
    )
    .unwrap();
    store.flush().unwrap();

    assert_eq!(report.stats.messages_fetched, 4);
    assert_eq!(report.stats.rules_matched, 2);
    assert_eq!(report.stats.directives_applied, 3);
    assert!(report.errors.is_empty());

    assert_eq!(
        mailbox.labels(&MessageId::new("m1")).unwrap(),
        vec!["Label_Jobs"]
    );
    assert_eq!(
        mailbox.labels(&MessageId::new("m2")).unwrap(),
        vec!["UNREAD", "TRASH"]
    );
    assert_eq!(
        mailbox.labels(&MessageId::new("m3")).unwrap(),
        vec!["INBOX", "UNREAD"]
    );

    // A second run over the same mailbox applies nothing new
    let reopened = JsonFileProcessedStore::open(dir.path().join("processed.json")).unwrap();
    let again = process_messages(
        &supplier,
        &rules,
        &mailbox,
        &reopened,
        &RunOptions::default(),
        &ctx,
    )
    .unwrap();

    assert_eq!(again.stats.directives_applied, 0);
    assert_eq!(again.stats.pairs_skipped, 2);
    assert!(again.directives.is_empty());
    assert_eq!(
        mailbox.labels(&MessageId::new("m1")).unwrap(),
        vec!["Label_Jobs"]
    );
}

#[test]
fn test_window_limits_what_is_processed() {
    let dir = TempDir::new().unwrap();
    let rules = load_rules_file(&write_rules(dir.path())).unwrap();
    let supplier = GmailDumpSupplier::new(write_dump(dir.path()));
    let messages = supplier.fetch(&FetchWindow::all()).unwrap();
    let mailbox = InMemoryMailbox::from_messages(&messages);
    let store = JsonFileProcessedStore::open(dir.path().join("processed.json")).unwrap();

    let options = RunOptions {
        window: FetchWindow::last_days(3, now()),
        ..RunOptions::default()
    };
    let report = process_messages(
        &supplier,
        &rules,
        &mailbox,
        &store,
        &options,
        &EvalContext::at(now()),
    )
    .unwrap();

    // m2 is outside the window, so the stale newsletter rule never sees it
    assert_eq!(report.stats.messages_fetched, 3);
    assert_eq!(report.stats.rules_matched, 1);
    assert!(
        report
            .directives
            .iter()
            .all(|d| d.directive.action != Action::move_to("TRASH").unwrap())
    );
}

#[test]
fn test_invalid_rules_file_fails_before_processing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.json");
    write_json(
        &path,
        &json!({
            "rules": [{
                "name": "Bad",
                "predicate": "all",
                "conditions": [{ "field": "subject", "predicate": "before", "value": "2024-01-01" }],
                "actions": [{ "type": "mark_as_read" }]
            }]
        }),
    );

    let err = load_rules_file(&path).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Invalid rules file"));
    assert!(message.contains("not supported"));
}

#[test]
fn test_parallel_run_matches_sequential() {
    let dir = TempDir::new().unwrap();
    let rule_set = load_rules_file(&write_rules(dir.path())).unwrap();
    let supplier = GmailDumpSupplier::new(write_dump(dir.path()));
    let messages = supplier.fetch(&FetchWindow::all()).unwrap();
    let ctx = EvalContext::at(now());

    assert_eq!(
        run(&messages, &rule_set, &ctx),
        run_parallel(&messages, &rule_set, &ctx)
    );
}
