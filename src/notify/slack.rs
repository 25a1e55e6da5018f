use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use super::Notifier;
use crate::config::SlackSettings;
use crate::http::{self, ApiError};

const SERVICE: &str = "Slack";

/// Posts messages through a Slack incoming webhook.
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
    channel: Option<String>,
    username: String,
    icon_emoji: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    username: &'a str,
    icon_emoji: &'a str,
    text: &'a str,
}

impl SlackNotifier {
    pub fn new(settings: &SlackSettings) -> Result<Self, ApiError> {
        Ok(Self {
            client: http::build_client(settings.timeout_secs)?,
            webhook_url: settings.webhook_url.clone(),
            channel: settings.channel.clone(),
            username: settings.username.clone(),
            icon_emoji: settings.icon_emoji.clone(),
        })
    }

    fn payload<'a>(&'a self, text: &'a str) -> WebhookPayload<'a> {
        WebhookPayload {
            channel: self.channel.as_deref(),
            username: &self.username,
            icon_emoji: &self.icon_emoji,
            text,
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    #[instrument(skip_all)]
    async fn post_message(&self, text: &str) -> Result<(), ApiError> {
        debug!(channel = ?self.channel, bytes = text.len(), "posting message to Slack");
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.payload(text))
            .send()
            .await?;
        http::check_response(SERVICE, response).await?;
        Ok(())
    }
}
