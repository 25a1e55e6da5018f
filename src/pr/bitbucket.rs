use async_trait::async_trait;
use std::future::Future;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::types::{PullRequest, RepoCoordinates, Reviewer};
use super::RepositoryClient;
use crate::config::{BitbucketSettings, Credentials};
use crate::http::{self, ApiError};

const SERVICE: &str = "Bitbucket";
const PAGE_LIMIT: u32 = 50;

/// Client for the Bitbucket Server REST API (`/rest/api/1.0`).
pub struct BitbucketClient {
    client: reqwest::Client,
    base_url: String,
    coords: RepoCoordinates,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    values: Vec<T>,
    #[serde(default = "default_last_page")]
    is_last_page: bool,
    next_page_start: Option<u32>,
}

fn default_last_page() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    name: String,
    display_name: Option<String>,
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawParticipant {
    user: RawUser,
    #[serde(default)]
    approved: bool,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawLinks {
    #[serde(rename = "self", default)]
    self_links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequest {
    id: u64,
    title: String,
    author: RawParticipant,
    updated_date: Option<i64>,
    #[serde(default)]
    reviewers: Vec<RawParticipant>,
    #[serde(default)]
    links: RawLinks,
}

impl BitbucketClient {
    pub fn new(settings: &BitbucketSettings) -> Result<Self, ApiError> {
        Ok(Self {
            client: http::build_client(settings.timeout_secs)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            coords: settings.repo.clone(),
            credentials: settings.credentials.clone(),
        })
    }

    fn pull_requests_endpoint(&self) -> String {
        format!(
            "{}/rest/api/1.0/projects/{}/repos/{}/pull-requests",
            self.base_url, self.coords.project, self.coords.repo
        )
    }

    fn browse_url(&self, id: u64) -> String {
        format!(
            "{}/projects/{}/repos/{}/pull-requests/{}",
            self.base_url, self.coords.project, self.coords.repo, id
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Basic { user, password } => request.basic_auth(user, Some(password)),
            Credentials::Token(token) => request.bearer_auth(token),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self
            .authorize(self.client.get(url))
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = http::check_response(SERVICE, response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RepositoryClient for BitbucketClient {
    #[instrument(skip(self))]
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, ApiError> {
        let endpoint = self.pull_requests_endpoint();
        let raw = collect_pages(|start| {
            let endpoint = endpoint.clone();
            async move {
                let url = Url::parse_with_params(
                    &endpoint,
                    &[
                        ("state", "OPEN".to_string()),
                        ("start", start.to_string()),
                        ("limit", PAGE_LIMIT.to_string()),
                    ],
                )
                .map_err(|e| invalid_url(&endpoint, e))?;

                debug!(repo = %self.coords, start, "fetching pull request page");
                let page: Page<RawPullRequest> = self.get_json(url).await?;
                debug!(count = page.values.len(), last = page.is_last_page, "received page");
                Ok::<_, ApiError>(page)
            }
        })
        .await?;

        Ok(raw
            .into_iter()
            .map(|raw| into_pull_request(raw, |id| self.browse_url(id)))
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_review_status(&self, pull_request_id: u64) -> Result<Vec<Reviewer>, ApiError> {
        let endpoint = format!("{}/{}", self.pull_requests_endpoint(), pull_request_id);
        let url = Url::parse(&endpoint).map_err(|e| invalid_url(&endpoint, e))?;

        let detail: RawPullRequest = self.get_json(url).await?;
        let reviewers: Vec<Reviewer> = detail.reviewers.into_iter().map(into_reviewer).collect();
        debug!(
            reviewers = reviewers.len(),
            approved = reviewers.iter().filter(|r| r.approved).count(),
            "received review status"
        );
        Ok(reviewers)
    }
}

fn invalid_url(url: &str, err: impl std::fmt::Display) -> ApiError {
    ApiError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

/// Fetch pages starting at offset 0 until the server reports the last one,
/// returning all values in page order.
async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut values = Vec::new();
    let mut start = 0u32;

    loop {
        let page = fetch_page(start).await?;
        values.extend(page.values);

        match next_start(page.is_last_page, page.next_page_start, start) {
            Some(next) => start = next,
            None => break,
        }
    }

    Ok(values)
}

/// Start offset of the next page, or None when paging is done.
/// A server that does not advance the offset ends the loop.
fn next_start(is_last_page: bool, next_page_start: Option<u32>, current: u32) -> Option<u32> {
    if is_last_page {
        return None;
    }
    next_page_start.filter(|next| *next > current)
}

fn into_pull_request(raw: RawPullRequest, browse_url: impl Fn(u64) -> String) -> PullRequest {
    let url = raw
        .links
        .self_links
        .into_iter()
        .next()
        .map(|link| link.href)
        .unwrap_or_else(|| browse_url(raw.id));

    let author = raw.author.user;
    PullRequest {
        id: raw.id,
        title: raw.title,
        author: author.display_name.unwrap_or(author.name),
        url,
        updated_at: raw.updated_date.and_then(DateTime::<Utc>::from_timestamp_millis),
        reviewers: Vec::new(),
    }
}

fn into_reviewer(raw: RawParticipant) -> Reviewer {
    Reviewer {
        display_name: raw.user.display_name.unwrap_or_else(|| raw.user.name.clone()),
        name: raw.user.name,
        email: raw.user.email_address,
        approved: raw.approved,
    }
}
