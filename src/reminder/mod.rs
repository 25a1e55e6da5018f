pub mod filter;
pub mod format;

pub use filter::{evaluate, is_settled, pending_reviewers, should_remind};
pub use format::format_reminder;

use serde::Deserialize;

/// Decides which pull requests get a reminder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReminderPolicy {
    /// Case-insensitive title substrings that suppress reminders
    pub ignore_words: Vec<String>,
    /// Remind about pull requests that have no reviewers assigned
    pub remind_without_reviewers: bool,
    /// Suppress the reminder as soon as one reviewer has approved
    pub skip_if_any_approved: bool,
    /// Only remind once a pull request has been idle this long; 0 disables
    pub quiet_period_minutes: u64,
}
