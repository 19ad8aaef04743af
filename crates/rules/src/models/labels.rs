//! Well-known Gmail system label IDs

pub const INBOX: &str = "INBOX";
pub const TRASH: &str = "TRASH";
pub const SPAM: &str = "SPAM";
pub const STARRED: &str = "STARRED";
pub const IMPORTANT: &str = "IMPORTANT";
pub const UNREAD: &str = "UNREAD";

/// Labels a move only adds; it leaves the message where it is
pub const FLAG_LABELS: [&str; 3] = [STARRED, IMPORTANT, UNREAD];

/// Labels a move to a regular folder takes the message out of
pub const LOCATION_LABELS: [&str; 3] = [INBOX, SPAM, TRASH];

/// Whether moving to this label only flags the message
pub fn is_flag(label: &str) -> bool {
    FLAG_LABELS.contains(&label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_labels() {
        assert!(is_flag("STARRED"));
        assert!(is_flag("UNREAD"));
        assert!(!is_flag("INBOX"));
        assert!(!is_flag("Receipts"));
    }
}
