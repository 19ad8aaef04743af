//! In-memory processed store

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use super::ProcessedStore;
use crate::models::MessageId;

/// In-memory implementation of ProcessedStore
#[derive(Debug, Default)]
pub struct InMemoryProcessedStore {
    entries: RwLock<HashMap<(MessageId, String), DateTime<Utc>>>,
}

impl InMemoryProcessedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn from_entries(
        entries: impl IntoIterator<Item = ((MessageId, String), DateTime<Utc>)>,
    ) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Copy of every entry, sorted by message then rule
    pub(crate) fn snapshot(&self) -> Vec<((MessageId, String), DateTime<Utc>)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .map(|(key, at)| (key.clone(), *at))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl ProcessedStore for InMemoryProcessedStore {
    fn is_processed(&self, message: &MessageId, rule: &str) -> Result<bool> {
        let entries = self.entries.read().unwrap();
        Ok(entries.contains_key(&(message.clone(), rule.to_string())))
    }

    fn mark_processed(&self, message: &MessageId, rule: &str, at: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert((message.clone(), rule.to_string()), at);
        Ok(())
    }

    fn last_processed(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.entries.read().unwrap().values().max().copied())
    }
}
