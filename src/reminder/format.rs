use std::collections::HashMap;

use crate::pr::{PullRequest, Reviewer};

/// Render the Slack reminder for one pull request.
///
/// Reviewers found in `mentions` (keyed by email, then account name) are
/// mentioned as `<@id>` so Slack notifies them; everyone else is named as
/// `@DisplayName`. The output depends only on the arguments.
pub fn format_reminder(pr: &PullRequest, pending: &[&Reviewer], mentions: &HashMap<String, String>) -> String {
    let reviewers = if pending.is_empty() {
        "nobody assigned yet".to_string()
    } else {
        pending
            .iter()
            .map(|r| mention(r, mentions))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let updated = match pr.updated_at {
        Some(at) => at.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "unknown".to_string(),
    };

    format!(
        ":bell: Pull request waiting for review: <{}|{}>\nReviewers: {}\nAuthor: {} | Last updated: {}",
        pr.url,
        escape(&pr.title),
        reviewers,
        escape(&pr.author),
        updated
    )
}

fn mention(reviewer: &Reviewer, mentions: &HashMap<String, String>) -> String {
    let mapped = reviewer
        .email
        .as_ref()
        .and_then(|email| mentions.get(email))
        .or_else(|| mentions.get(&reviewer.name));

    match mapped {
        Some(id) => format!("<@{}>", id.trim_start_matches('@')),
        None => format!("@{}", escape(&reviewer.display_name)),
    }
}

/// Slack treats `&`, `<` and `>` as control characters in message text;
/// unescaped, a name like `<!here>` would ping the whole channel.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
