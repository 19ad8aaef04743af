//! Action executors
//!
//! An executor carries out directives against a mailbox. Label changes
//! follow Gmail semantics: read state is the `UNREAD` label and moving a
//! message means labelling it and taking it out of the system folders.

use anyhow::{Result, bail};
use log::info;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::engine::Directive;
use crate::models::{Action, MessageId, MessageRecord, labels};

/// Carries out one directive
pub trait ActionExecutor: Send + Sync {
    fn apply(&self, directive: &Directive) -> Result<()>;
}

/// Executor that only logs and records what it was asked to do
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    applied: Mutex<Vec<Directive>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directives seen so far, in order
    pub fn applied(&self) -> Vec<Directive> {
        self.applied.lock().unwrap().clone()
    }
}

impl ActionExecutor for DryRunExecutor {
    fn apply(&self, directive: &Directive) -> Result<()> {
        info!(
            "[dry run] {} on message {} (rule '{}')",
            directive.action, directive.message_id, directive.rule
        );
        self.applied.lock().unwrap().push(directive.clone());
        Ok(())
    }
}

/// Label changes for one action
struct LabelChange {
    add: Vec<String>,
    remove: Vec<String>,
}

impl LabelChange {
    fn for_action(action: &Action) -> Self {
        match action {
            Action::MarkAsRead => Self {
                add: vec![],
                remove: vec![labels::UNREAD.to_string()],
            },
            Action::MarkAsUnread => Self {
                add: vec![labels::UNREAD.to_string()],
                remove: vec![],
            },
            Action::MoveMessage { destination } if labels::is_flag(destination) => Self {
                add: vec![destination.clone()],
                remove: vec![],
            },
            Action::MoveMessage { destination } => Self {
                add: vec![destination.clone()],
                remove: labels::LOCATION_LABELS
                    .iter()
                    .filter(|l| **l != destination.as_str())
                    .map(|l| l.to_string())
                    .collect(),
            },
        }
    }

    fn apply_to(&self, current: &mut Vec<String>) {
        current.retain(|l| !self.remove.contains(l));
        for label in &self.add {
            if !current.contains(label) {
                current.push(label.clone());
            }
        }
    }
}

/// In-memory mailbox that applies directives to message labels
///
/// Uses a RwLock-protected map so it can be shared across threads.
#[derive(Default)]
pub struct InMemoryMailbox {
    messages: RwLock<HashMap<MessageId, Vec<String>>>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailbox holding the current labels of `messages`
    pub fn from_messages<'a>(messages: impl IntoIterator<Item = &'a MessageRecord>) -> Self {
        let current = messages
            .into_iter()
            .map(|m| (m.id.clone(), m.label_ids.clone()))
            .collect();
        Self {
            messages: RwLock::new(current),
        }
    }

    pub fn insert(&self, id: MessageId, label_ids: Vec<String>) {
        self.messages.write().unwrap().insert(id, label_ids);
    }

    /// Current labels of a message, if the mailbox holds it
    pub fn labels(&self, id: &MessageId) -> Option<Vec<String>> {
        self.messages.read().unwrap().get(id).cloned()
    }
}

impl ActionExecutor for InMemoryMailbox {
    fn apply(&self, directive: &Directive) -> Result<()> {
        let mut messages = self.messages.write().unwrap();
        let Some(current) = messages.get_mut(&directive.message_id) else {
            bail!("Message {} not found in mailbox", directive.message_id);
        };

        LabelChange::for_action(&directive.action).apply_to(current);
        info!(
            "Applied {} to message {} (rule '{}')",
            directive.action, directive.message_id, directive.rule
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(id: &str, action: Action) -> Directive {
        Directive {
            message_id: MessageId::new(id),
            rule: "Test".to_string(),
            action,
        }
    }

    fn mailbox(labels: &[&str]) -> InMemoryMailbox {
        let mailbox = InMemoryMailbox::new();
        mailbox.insert(
            MessageId::new("m1"),
            labels.iter().map(|l| l.to_string()).collect(),
        );
        mailbox
    }

    fn labels_after(start: &[&str], action: Action) -> Vec<String> {
        let mailbox = mailbox(start);
        mailbox.apply(&directive("m1", action)).unwrap();
        mailbox.labels(&MessageId::new("m1")).unwrap()
    }

    #[test]
    fn test_mark_as_read_and_unread() {
        assert_eq!(labels_after(&["INBOX", "UNREAD"], Action::MarkAsRead), vec!["INBOX"]);
        assert_eq!(
            labels_after(&["INBOX"], Action::MarkAsUnread),
            vec!["INBOX", "UNREAD"]
        );
        assert_eq!(
            labels_after(&["INBOX", "UNREAD"], Action::MarkAsUnread),
            vec!["INBOX", "UNREAD"]
        );
    }

    #[test]
    fn test_move_to_user_label_leaves_inbox() {
        assert_eq!(
            labels_after(
                &["INBOX", "UNREAD"],
                Action::move_to("Label_42").unwrap()
            ),
            vec!["UNREAD", "Label_42"]
        );
        assert_eq!(
            labels_after(&["SPAM"], Action::move_to("INBOX").unwrap()),
            vec!["INBOX"]
        );
        assert_eq!(
            labels_after(&["INBOX"], Action::move_to("TRASH").unwrap()),
            vec!["TRASH"]
        );
    }

    #[test]
    fn test_move_to_flag_label_only_adds() {
        assert_eq!(
            labels_after(&["INBOX"], Action::move_to("STARRED").unwrap()),
            vec!["INBOX", "STARRED"]
        );
        assert_eq!(
            labels_after(&["INBOX"], Action::move_to("IMPORTANT").unwrap()),
            vec!["INBOX", "IMPORTANT"]
        );
    }

    #[test]
    fn test_unknown_message_is_an_error() {
        let mailbox = mailbox(&["INBOX"]);
        let err = mailbox
            .apply(&directive("missing", Action::MarkAsRead))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_dry_run_records_without_changes() {
        let executor = DryRunExecutor::new();
        executor.apply(&directive("m1", Action::MarkAsRead)).unwrap();
        executor
            .apply(&directive("m2", Action::move_to("Archive").unwrap()))
            .unwrap();

        let applied = executor.applied();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[1].message_id.as_str(), "m2");
    }
}
