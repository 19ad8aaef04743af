//! Message record: the immutable snapshot of one email the engine evaluates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::labels;

/// Unique identifier for a message (provider-assigned message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse an email address from a string like "John Doe <john@example.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim().trim_matches('"').trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Parse a comma-separated list of addresses
    pub fn parse_list(s: &str) -> Vec<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Format the email address for display
    ///
    /// This is also the text string conditions on `from` and `to` match against.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// One email as seen by the rule engine
///
/// Created by a message supplier and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Provider message ID
    pub id: MessageId,
    /// Provider thread ID
    pub thread_id: String,
    /// Sender
    pub from: EmailAddress,
    /// Recipients (To field)
    pub to: Vec<EmailAddress>,
    /// Subject line
    pub subject: String,
    /// Plain text snippet of the body
    pub body: String,
    /// Provider label IDs (e.g., "INBOX", "UNREAD", "Label_42")
    pub label_ids: Vec<String>,
    /// When the message was received.
    /// `None` when the supplier could not determine a valid timestamp.
    pub received_at: Option<DateTime<Utc>>,
}

impl MessageRecord {
    /// Create a new message builder
    pub fn builder(id: impl Into<MessageId>) -> MessageRecordBuilder {
        MessageRecordBuilder::new(id.into())
    }

    /// A message is read when it does not carry the UNREAD label
    pub fn is_read(&self) -> bool {
        !self.has_label(labels::UNREAD)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.iter().any(|l| l == label)
    }
}

/// Builder for creating MessageRecord instances
pub struct MessageRecordBuilder {
    id: MessageId,
    thread_id: Option<String>,
    from: Option<EmailAddress>,
    to: Vec<EmailAddress>,
    subject: String,
    body: String,
    label_ids: Vec<String>,
    received_at: Option<DateTime<Utc>>,
}

impl MessageRecordBuilder {
    fn new(id: MessageId) -> Self {
        Self {
            id,
            thread_id: None,
            from: None,
            to: Vec::new(),
            subject: String::new(),
            body: String::new(),
            label_ids: Vec::new(),
            received_at: None,
        }
    }

    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn from(mut self, from: EmailAddress) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: Vec<EmailAddress>) -> Self {
        self.to = to;
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn label_ids(mut self, label_ids: Vec<String>) -> Self {
        self.label_ids = label_ids;
        self
    }

    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn maybe_received_at(mut self, received_at: Option<DateTime<Utc>>) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn build(self) -> MessageRecord {
        let thread_id = self
            .thread_id
            .unwrap_or_else(|| self.id.as_str().to_string());
        MessageRecord {
            id: self.id,
            thread_id,
            from: self.from.unwrap_or_else(|| EmailAddress::new("")),
            to: self.to,
            subject: self.subject,
            body: self.body,
            label_ids: self.label_ids,
            received_at: self.received_at,
        }
    }
}
