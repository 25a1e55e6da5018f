pub mod bitbucket;
pub mod types;

pub use bitbucket::BitbucketClient;
pub use types::{PullRequest, RepoCoordinates, Reviewer};

use async_trait::async_trait;
use thiserror::Error;

use crate::http::ApiError;

#[derive(Debug, Error)]
#[error("Invalid repository '{0}', expected PROJECT/REPO")]
pub struct InvalidRepo(pub String);

/// Read access to the pull requests of one repository.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// List the open pull requests in the order the server returns them.
    /// Reviewers are not populated; use `get_review_status` for that.
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, ApiError>;

    /// Fetch the reviewers of one pull request and whether each has approved.
    async fn get_review_status(&self, pull_request_id: u64) -> Result<Vec<Reviewer>, ApiError>;
}

/// Parse `PROJECT/REPO` repository coordinates.
pub fn parse_repo(value: &str) -> Result<RepoCoordinates, InvalidRepo> {
    let segments: Vec<_> = value
        .trim()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 2 {
        return Err(InvalidRepo(value.to_string()));
    }

    Ok(RepoCoordinates {
        project: segments[0].to_string(),
        repo: segments[1].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_repo() {
        let coords = parse_repo("PLAT/billing").unwrap();
        assert_eq!(coords.project, "PLAT");
        assert_eq!(coords.repo, "billing");

        let coords = parse_repo(" PLAT/billing/ ").unwrap();
        assert_eq!(coords.repo, "billing");
    }

    #[test]
    fn test_parse_invalid_repo() {
        assert!(parse_repo("billing").is_err());
        assert!(parse_repo("").is_err());
        assert!(parse_repo("a/b/c").is_err());
    }
}
