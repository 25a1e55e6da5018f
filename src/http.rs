use reqwest::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const USER_AGENT: &str = "pr-reminder";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{service} rejected the configured credentials (HTTP {status})")]
    Auth { service: &'static str, status: u16 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// Build the shared HTTP client for one service.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ApiError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Map a non-success response onto `ApiError`, passing successful ones through.
pub async fn check_response(service: &'static str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    debug!(service, status = status.as_u16(), "request rejected");
    if let Some(err) = classify_status(service, status) {
        return Err(err);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Http {
        service,
        status: status.as_u16(),
        body: truncate(&body, 200),
    })
}

fn classify_status(service: &'static str, status: StatusCode) -> Option<ApiError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(ApiError::Auth {
            service,
            status: status.as_u16(),
        }),
        _ => None,
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
