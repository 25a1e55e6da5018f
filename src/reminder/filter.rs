use chrono::{DateTime, Utc};

use super::ReminderPolicy;
use crate::pr::{PullRequest, Reviewer};

/// Outcome of checking one pull request against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Remind,
    /// Title contains this ignore word
    IgnoredTitle(String),
    Approved,
    NoReviewers,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Remind => write!(f, "remind"),
            Decision::IgnoredTitle(word) => write!(f, "title contains ignore word '{}'", word),
            Decision::Approved => write!(f, "already approved"),
            Decision::NoReviewers => write!(f, "no reviewers assigned"),
        }
    }
}

/// Check a pull request (with its reviewers populated) against the policy.
///
/// Ignore words are checked first, so a matching title is reported as such
/// even when the pull request is also approved.
pub fn evaluate(pr: &PullRequest, policy: &ReminderPolicy) -> Decision {
    if let Some(word) = ignored_word(&pr.title, &policy.ignore_words) {
        return Decision::IgnoredTitle(word.to_string());
    }

    if pr.reviewers.is_empty() {
        return if policy.remind_without_reviewers {
            Decision::Remind
        } else {
            Decision::NoReviewers
        };
    }

    let approved = if policy.skip_if_any_approved {
        pr.reviewers.iter().any(|r| r.approved)
    } else {
        pr.reviewers.iter().all(|r| r.approved)
    };

    if approved {
        Decision::Approved
    } else {
        Decision::Remind
    }
}

pub fn should_remind(pr: &PullRequest, policy: &ReminderPolicy) -> bool {
    evaluate(pr, policy) == Decision::Remind
}

/// Reviewers that have not approved yet, in the order the server listed them.
pub fn pending_reviewers(pr: &PullRequest) -> Vec<&Reviewer> {
    pr.reviewers.iter().filter(|r| !r.approved).collect()
}

/// Whether the pull request has been idle for the configured quiet period.
/// Pull requests without an update timestamp always count as settled.
pub fn is_settled(pr: &PullRequest, policy: &ReminderPolicy, now: DateTime<Utc>) -> bool {
    if policy.quiet_period_minutes == 0 {
        return true;
    }
    let Some(updated_at) = pr.updated_at else {
        return true;
    };
    let idle_minutes = now.signed_duration_since(updated_at).num_minutes();
    u64::try_from(idle_minutes).is_ok_and(|idle| idle >= policy.quiet_period_minutes)
}

fn ignored_word<'a>(title: &str, ignore_words: &'a [String]) -> Option<&'a str> {
    let title = title.to_lowercase();
    ignore_words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .find(|w| title.contains(&w.to_lowercase()))
}
