//! Message suppliers
//!
//! A supplier produces the batch of messages a run evaluates. The engine
//! never fetches anything itself.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use std::path::PathBuf;

use crate::gmail::{api::GmailMessage, normalize_message};
use crate::models::MessageRecord;

/// Which messages to fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchWindow {
    /// Only messages received at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// At most this many messages, newest first
    pub max_messages: Option<usize>,
}

impl FetchWindow {
    /// No lower bound and no limit
    pub fn all() -> Self {
        Self::default()
    }

    /// Messages received in the last `days` days
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Self {
        Self {
            since: Some(now - Duration::days(i64::from(days))),
            max_messages: None,
        }
    }

    pub fn limit(mut self, max_messages: usize) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    /// Apply the window to an already-fetched list
    ///
    /// Messages without a timestamp are kept when no lower bound is set and
    /// dropped otherwise. Output is newest first; undated messages sort last.
    pub fn select(&self, mut messages: Vec<MessageRecord>) -> Vec<MessageRecord> {
        if let Some(since) = self.since {
            messages.retain(|m| m.received_at.is_some_and(|at| at >= since));
        }

        // Stable, so equal timestamps keep supplier order
        messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));

        if let Some(max) = self.max_messages {
            messages.truncate(max);
        }
        messages
    }
}

/// Source of messages for a run
pub trait MessageSupplier: Send + Sync {
    /// Fetch the messages inside `window`
    fn fetch(&self, window: &FetchWindow) -> Result<Vec<MessageRecord>>;
}

/// Supplier over a fixed list of messages
#[derive(Debug, Clone, Default)]
pub struct InMemorySupplier {
    messages: Vec<MessageRecord>,
}

impl InMemorySupplier {
    pub fn new(messages: Vec<MessageRecord>) -> Self {
        Self { messages }
    }
}

impl MessageSupplier for InMemorySupplier {
    fn fetch(&self, window: &FetchWindow) -> Result<Vec<MessageRecord>> {
        Ok(window.select(self.messages.clone()))
    }
}

/// Supplier reading a JSON array of Gmail API messages from disk
///
/// Each element has the shape returned by `users.messages.get?format=full`.
pub struct GmailDumpSupplier {
    path: PathBuf,
}

impl GmailDumpSupplier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MessageSupplier for GmailDumpSupplier {
    fn fetch(&self, window: &FetchWindow) -> Result<Vec<MessageRecord>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read message dump: {}", self.path.display()))?;
        let raw: Vec<GmailMessage> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid message dump: {}", self.path.display()))?;

        let total = raw.len();
        let mut messages = Vec::with_capacity(total);
        for gmail_msg in raw {
            let id = gmail_msg.id.clone();
            match normalize_message(gmail_msg) {
                Ok(message) => messages.push(message),
                Err(e) => warn!("Failed to normalize message {}: {:#}", id, e),
            }
        }

        let selected = window.select(messages);
        info!(
            "Loaded {} of {} messages from {}",
            selected.len(),
            total,
            self.path.display()
        );
        Ok(selected)
    }
}
