use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

use crate::config::Settings;
use crate::http::ApiError;
use crate::notify::Notifier;
use crate::pr::{PullRequest, RepositoryClient};
use crate::reminder;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to list open pull requests: {0}")]
    List(#[source] ApiError),

    #[error("Failed to fetch reviewers of pull request #{id}: {source}")]
    ReviewStatus {
        id: u64,
        #[source]
        source: ApiError,
    },

    #[error("Failed to send reminder for pull request #{id}: {source}")]
    Send {
        id: u64,
        #[source]
        source: ApiError,
    },
}

/// Counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub listed: usize,
    pub reminded: usize,
    pub skipped: usize,
}

/// List open pull requests, check each against the policy and send one
/// reminder per qualifying pull request, in listing order.
///
/// Pull requests are handled one at a time and the first error aborts the
/// run; reminders already sent stay sent.
pub async fn run(
    repo: &dyn RepositoryClient,
    notifier: &dyn Notifier,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<RunSummary, RunError> {
    let mut summary = RunSummary::default();

    info!("listing open pull requests");
    let pulls = repo.list_open_pull_requests().await.map_err(RunError::List)?;
    summary.listed = pulls.len();
    info!(count = pulls.len(), "fetched open pull requests");

    for pr in pulls {
        let span = info_span!("pull_request", id = pr.id);
        let reminded = process(pr, repo, notifier, settings, now)
            .instrument(span)
            .await?;
        if reminded {
            summary.reminded += 1;
        } else {
            summary.skipped += 1;
        }
    }

    Ok(summary)
}

/// Handle one pull request. Returns whether a reminder was sent.
async fn process(
    mut pr: PullRequest,
    repo: &dyn RepositoryClient,
    notifier: &dyn Notifier,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Result<bool, RunError> {
    let policy = &settings.reminder;

    if !reminder::is_settled(&pr, policy, now) {
        debug!(title = %pr.title, "updated within the quiet period, skipping");
        return Ok(false);
    }

    pr.reviewers = repo
        .get_review_status(pr.id)
        .await
        .map_err(|source| RunError::ReviewStatus { id: pr.id, source })?;

    if !reminder::should_remind(&pr, policy) {
        let reason = reminder::evaluate(&pr, policy);
        info!(title = %pr.title, reason = %reason, "skipping");
        return Ok(false);
    }

    let pending = reminder::pending_reviewers(&pr);
    let text = reminder::format_reminder(&pr, &pending, &settings.slack.users);
    notifier
        .post_message(&text)
        .await
        .map_err(|source| RunError::Send { id: pr.id, source })?;
    info!(title = %pr.title, pending = pending.len(), "reminder sent");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BitbucketSettings, Credentials, SlackSettings};
    use crate::pr::{RepoCoordinates, Reviewer};
    use crate::reminder::ReminderPolicy;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory repository: pull requests plus the reviewers each one has.
    #[derive(Default)]
    struct FakeRepository {
        pulls: Vec<PullRequest>,
        reviewers: HashMap<u64, Vec<Reviewer>>,
        fail_listing: bool,
        fail_review_status: bool,
        detail_calls: Mutex<Vec<u64>>,
    }

    impl FakeRepository {
        fn with_pull(mut self, id: u64, title: &str, reviewers: Vec<Reviewer>) -> Self {
            self.pulls.push(PullRequest {
                id,
                title: title.to_string(),
                author: "Dana".to_string(),
                url: format!("https://git.example.net/projects/PLAT/repos/billing/pull-requests/{}", id),
                updated_at: Some(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()),
                reviewers: vec![],
            });
            self.reviewers.insert(id, reviewers);
            self
        }
    }

    fn transport_error() -> ApiError {
        ApiError::Http {
            service: "Bitbucket",
            status: 502,
            body: "Bad Gateway".to_string(),
        }
    }

    #[async_trait]
    impl RepositoryClient for FakeRepository {
        async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, ApiError> {
            if self.fail_listing {
                return Err(transport_error());
            }
            Ok(self.pulls.clone())
        }

        async fn get_review_status(&self, pull_request_id: u64) -> Result<Vec<Reviewer>, ApiError> {
            self.detail_calls.lock().unwrap().push(pull_request_id);
            if self.fail_review_status {
                return Err(ApiError::Auth {
                    service: "Bitbucket",
                    status: 401,
                });
            }
            Ok(self.reviewers.get(&pull_request_id).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn post_message(&self, text: &str) -> Result<(), ApiError> {
            if self.fail {
                return Err(ApiError::Auth {
                    service: "Slack",
                    status: 403,
                });
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn reviewer(name: &str, approved: bool) -> Reviewer {
        Reviewer {
            name: name.to_lowercase(),
            display_name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            approved,
        }
    }

    fn settings(policy: ReminderPolicy) -> Settings {
        Settings {
            bitbucket: BitbucketSettings {
                base_url: "https://git.example.net".to_string(),
                repo: RepoCoordinates {
                    project: "PLAT".to_string(),
                    repo: "billing".to_string(),
                },
                credentials: Credentials::Token("token".to_string()),
                timeout_secs: 5,
            },
            slack: SlackSettings {
                webhook_url: "https://hooks.slack.com/services/T/B/X".to_string(),
                channel: None,
                username: "Pull Request Reminder".to_string(),
                icon_emoji: ":bell:".to_string(),
                timeout_secs: 5,
                users: HashMap::new(),
            },
            reminder: policy,
        }
    }

    fn ignoring(words: &[&str]) -> ReminderPolicy {
        ReminderPolicy {
            ignore_words: words.iter().map(|w| w.to_string()).collect(),
            ..ReminderPolicy::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_unapproved_pull_request_is_reminded() {
        let repo = FakeRepository::default().with_pull(1, "Fix bug", vec![reviewer("Alice", false)]);
        let notifier = RecordingNotifier::default();

        let summary = run(&repo, &notifier, &settings(ignoring(&[])), now()).await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Alice"));
        assert!(sent[0].contains("https://git.example.net/projects/PLAT/repos/billing/pull-requests/1"));
        assert_eq!(
            summary,
            RunSummary {
                listed: 1,
                reminded: 1,
                skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn test_ignored_title_sends_nothing() {
        let repo = FakeRepository::default().with_pull(
            1,
            "WIP: ignore this",
            vec![reviewer("Alice", false)],
        );
        let notifier = RecordingNotifier::default();

        let summary = run(&repo, &notifier, &settings(ignoring(&["ignore"])), now())
            .await
            .unwrap();

        assert!(notifier.sent().is_empty());
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_fully_approved_sends_nothing() {
        let repo = FakeRepository::default().with_pull(
            1,
            "Fix bug",
            vec![reviewer("Bob", true), reviewer("Carol", true)],
        );
        let notifier = RecordingNotifier::default();

        run(&repo, &notifier, &settings(ignoring(&[])), now()).await.unwrap();

        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_without_messages() {
        let repo = FakeRepository {
            fail_listing: true,
            ..FakeRepository::default()
        }
        .with_pull(1, "Fix bug", vec![reviewer("Alice", false)]);
        let notifier = RecordingNotifier::default();

        let err = run(&repo, &notifier, &settings(ignoring(&[])), now())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::List(ApiError::Http { status: 502, .. })));
        assert!(notifier.sent().is_empty());
        assert!(repo.detail_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_status_auth_failure_aborts() {
        let repo = FakeRepository {
            fail_review_status: true,
            ..FakeRepository::default()
        }
        .with_pull(7, "Fix bug", vec![reviewer("Alice", false)]);
        let notifier = RecordingNotifier::default();

        let err = run(&repo, &notifier, &settings(ignoring(&[])), now())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::ReviewStatus {
                id: 7,
                source: ApiError::Auth { .. }
            }
        ));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_stops_remaining_pull_requests() {
        let repo = FakeRepository::default()
            .with_pull(1, "First", vec![reviewer("Alice", false)])
            .with_pull(2, "Second", vec![reviewer("Bob", false)]);
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };

        let err = run(&repo, &notifier, &settings(ignoring(&[])), now())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Send { id: 1, .. }));
        assert_eq!(*repo.detail_calls.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_reminders_follow_listing_order() {
        let repo = FakeRepository::default()
            .with_pull(3, "Third in id, first listed", vec![reviewer("Alice", false)])
            .with_pull(1, "Skipped", vec![reviewer("Bob", true)])
            .with_pull(2, "Last listed", vec![reviewer("Carol", false)]);
        let notifier = RecordingNotifier::default();

        let summary = run(&repo, &notifier, &settings(ignoring(&[])), now()).await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("first listed"));
        assert!(sent[1].contains("Last listed"));
        assert_eq!(summary.skipped, 1);
        assert_eq!(*repo.detail_calls.lock().unwrap(), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_quiet_period_skips_without_fetching_reviewers() {
        let repo = FakeRepository::default().with_pull(1, "Fix bug", vec![reviewer("Alice", false)]);
        let notifier = RecordingNotifier::default();
        let policy = ReminderPolicy {
            quiet_period_minutes: 5 * 60,
            ..ReminderPolicy::default()
        };

        // Updated at 08:00, now is 12:00: still inside a five hour quiet period
        let summary = run(&repo, &notifier, &settings(policy), now()).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert!(notifier.sent().is_empty());
        assert!(repo.detail_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_data_produces_same_messages() {
        let repo = FakeRepository::default()
            .with_pull(1, "Fix bug", vec![reviewer("Alice", false), reviewer("Bob", false)]);
        let first = RecordingNotifier::default();
        let second = RecordingNotifier::default();
        let settings = settings(ignoring(&[]));

        run(&repo, &first, &settings, now()).await.unwrap();
        run(&repo, &second, &settings, now()).await.unwrap();

        assert_eq!(first.sent(), second.sent());
    }
}
