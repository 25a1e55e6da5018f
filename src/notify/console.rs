use async_trait::async_trait;
use colored::Colorize;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Notifier;
use crate::http::ApiError;

/// Prints reminders to stdout instead of posting them (`--dry-run`).
#[derive(Default)]
pub struct ConsoleNotifier {
    printed: AtomicUsize,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn post_message(&self, text: &str) -> Result<(), ApiError> {
        let n = self.printed.fetch_add(1, Ordering::Relaxed) + 1;
        println!("{}", format!("═══ Reminder #{} (dry run) ═══", n).cyan().bold());
        println!("{}", text);
        println!();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_printed_messages() {
        let notifier = ConsoleNotifier::new();
        notifier.post_message("first").await.unwrap();
        notifier.post_message("second").await.unwrap();
        assert_eq!(notifier.printed.load(Ordering::Relaxed), 2);
    }
}
