pub mod console;
pub mod slack;

pub use console::ConsoleNotifier;
pub use slack::SlackNotifier;

use async_trait::async_trait;

use crate::http::ApiError;

/// Destination for reminder messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post one message. No retries; the first failure is returned.
    async fn post_message(&self, text: &str) -> Result<(), ApiError>;
}
