//! JSON file backed processed store
//!
//! Keeps entries in memory and writes them out on [`flush`].
//!
//! [`flush`]: JsonFileProcessedStore::flush

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{InMemoryProcessedStore, ProcessedStore};
use crate::models::MessageId;

/// One entry of the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ProcessedRecord {
    message_id: MessageId,
    rule_identifier: String,
    processed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    processed: Vec<ProcessedRecord>,
}

/// Processed store persisted as a JSON document
pub struct JsonFileProcessedStore {
    path: PathBuf,
    entries: InMemoryProcessedStore,
}

impl JsonFileProcessedStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state: StateFile = match config::load_json_if_exists(&path)
            .with_context(|| format!("Failed to load processed state: {}", path.display()))?
        {
            Some(state) => state,
            None => {
                debug!("No processed state at {}, starting empty", path.display());
                StateFile::default()
            }
        };

        let entries = InMemoryProcessedStore::from_entries(
            state
                .processed
                .into_iter()
                .map(|r| ((r.message_id, r.rule_identifier), r.processed_at)),
        );
        info!(
            "Loaded {} processed entries from {}",
            entries.len(),
            path.display()
        );

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all entries to disk
    pub fn flush(&self) -> Result<()> {
        let processed: Vec<ProcessedRecord> = self
            .entries
            .snapshot()
            .into_iter()
            .map(|((message_id, rule_identifier), processed_at)| ProcessedRecord {
                message_id,
                rule_identifier,
                processed_at,
            })
            .collect();

        let count = processed.len();
        config::save_json_file(&self.path, &StateFile { processed })
            .with_context(|| format!("Failed to save processed state: {}", self.path.display()))?;
        debug!("Wrote {} processed entries to {}", count, self.path.display());
        Ok(())
    }
}

impl ProcessedStore for JsonFileProcessedStore {
    fn is_processed(&self, message: &MessageId, rule: &str) -> Result<bool> {
        self.entries.is_processed(message, rule)
    }

    fn mark_processed(&self, message: &MessageId, rule: &str, at: DateTime<Utc>) -> Result<()> {
        self.entries.mark_processed(message, rule, at)
    }

    fn last_processed(&self) -> Result<Option<DateTime<Utc>>> {
        self.entries.last_processed()
    }
}
