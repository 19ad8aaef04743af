//! Processed store trait definition

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::MessageId;

/// Trait for processed-pair storage
///
/// Keyed by message ID and rule identifier. Implementations must be safe
/// to share across threads.
pub trait ProcessedStore: Send + Sync {
    /// Whether `rule` has already been applied to `message`
    fn is_processed(&self, message: &MessageId, rule: &str) -> Result<bool>;

    /// Record that `rule` was applied to `message` at `at`
    fn mark_processed(&self, message: &MessageId, rule: &str, at: DateTime<Utc>) -> Result<()>;

    /// Most recent time anything was marked processed
    fn last_processed(&self) -> Result<Option<DateTime<Utc>>>;
}
