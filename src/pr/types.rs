use chrono::{DateTime, Utc};

/// Snapshot of an open pull request, fetched fresh on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    /// Pull request id within the repository (e.g., 42)
    pub id: u64,
    /// Pull request title
    pub title: String,
    /// Author's display name
    pub author: String,
    /// Browser link to the pull request
    pub url: String,
    /// When the pull request was last updated, if the server reported it
    pub updated_at: Option<DateTime<Utc>>,
    /// Assigned reviewers. Empty until the review status has been fetched.
    pub reviewers: Vec<Reviewer>,
}

/// A reviewer assigned to one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer {
    /// Account name (slug) on the hosting server
    pub name: String,
    pub display_name: String,
    pub email: Option<String>,
    pub approved: bool,
}

/// Identifies the repository to scan: `{project}/{repo}` on a Bitbucket server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub project: String,
    pub repo: String,
}

impl std::fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.repo)
    }
}
