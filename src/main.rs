mod config;
mod http;
mod notify;
mod pr;
mod reminder;
mod runner;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use notify::{ConsoleNotifier, Notifier, SlackNotifier};

/// PR Reminder — scans open Bitbucket pull requests and reminds pending
/// reviewers in Slack. Runs once; schedule it with cron or a systemd timer.
#[derive(Parser, Debug)]
#[command(name = "pr-reminder", version, about)]
struct Cli {
    /// Config file path (defaults to .pr-reminder.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Repository to scan as PROJECT/REPO, overriding BB_PROJECT and BB_REPO
    #[arg(short, long, value_name = "PROJECT/REPO")]
    repo: Option<String>,

    /// Slack channel to post to, overriding SLACK_CHANNEL
    #[arg(long)]
    channel: Option<String>,

    /// Print reminders to stdout instead of posting them to Slack
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Ok(path) = dotenv::dotenv() {
        debug!(path = %path.display(), "loaded .env file");
    }

    info!("loading configuration");
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(repo) = cli.repo.as_deref() {
        config.override_repo(repo)?;
    }
    if let Some(channel) = cli.channel {
        config.slack.channel = Some(channel);
    }
    let settings = config.resolve()?;

    let _main_span = info_span!("pr_remind", repo = %settings.bitbucket.repo).entered();
    debug!(
        ignore_words = settings.reminder.ignore_words.len(),
        remind_without_reviewers = settings.reminder.remind_without_reviewers,
        quiet_period_minutes = settings.reminder.quiet_period_minutes,
        "resolved settings"
    );

    let repository = pr::BitbucketClient::new(&settings.bitbucket)?;
    let console;
    let slack;
    let notifier: &dyn Notifier = if cli.dry_run {
        info!("dry run, reminders will be printed instead of posted");
        console = ConsoleNotifier::new();
        &console
    } else {
        slack = SlackNotifier::new(&settings.slack)?;
        &slack
    };

    let summary = runner::run(&repository, notifier, &settings, chrono::Utc::now()).await?;
    info!(
        listed = summary.listed,
        reminded = summary.reminded,
        skipped = summary.skipped,
        "done"
    );

    Ok(())
}
