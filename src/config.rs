use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::pr::{self, RepoCoordinates};
use crate::reminder::ReminderPolicy;

pub const DEFAULT_CONFIG_FILE: &str = ".pr-reminder.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SLACK_USERNAME: &str = "Pull Request Reminder";
const DEFAULT_SLACK_ICON: &str = ":bell:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting {0} (set it in the environment or the config file)")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Raw configuration as read from .pr-reminder.toml and the environment.
///
/// Every field is optional here; `resolve` checks that the required ones
/// are present and produces the `Settings` the run works with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bitbucket: BitbucketConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    /// Filter settings: ignore words, approval and reviewer policies
    #[serde(default)]
    pub reminder: ReminderPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BitbucketConfig {
    /// Server root, e.g. https://git.example.net. Falls back to BB_URL.
    pub base_url: Option<String>,
    /// Project key. Falls back to BB_PROJECT.
    pub project: Option<String>,
    /// Repository slug. Falls back to BB_REPO.
    pub repo: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// HTTP access token, used instead of user/password when set.
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackConfig {
    /// Incoming webhook URL. Falls back to SLACK_WEBHOOK_URL.
    pub webhook_url: Option<String>,
    /// Channel override; the webhook's own channel is used when unset.
    pub channel: Option<String>,
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Reviewer email (or account name) to Slack member id or handle
    #[serde(default)]
    pub users: HashMap<String, String>,
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bitbucket: BitbucketSettings,
    pub slack: SlackSettings,
    pub reminder: ReminderPolicy,
}

#[derive(Debug, Clone)]
pub struct BitbucketSettings {
    pub base_url: String,
    pub repo: RepoCoordinates,
    pub credentials: Credentials,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub enum Credentials {
    Basic { user: String, password: String },
    Token(String),
}

// Keep secrets out of debug logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"***")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlackSettings {
    pub webhook_url: String,
    pub channel: Option<String>,
    pub username: String,
    pub icon_emoji: String,
    pub timeout_secs: u64,
    pub users: HashMap<String, String>,
}

impl Config {
    /// Load configuration from `path`, or from .pr-reminder.toml in the
    /// current directory when no path is given, then fill unset values from
    /// the environment.
    ///
    /// A missing default file is not an error; a missing explicit one is.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Fill every setting the file left unset from `lookup` (the process
    /// environment outside of tests). File values take precedence.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fill = |slot: &mut Option<String>, key: &str| {
            if slot.is_none() {
                *slot = lookup(key).filter(|v| !v.trim().is_empty());
            }
        };

        fill(&mut self.bitbucket.base_url, "BB_URL");
        fill(&mut self.bitbucket.project, "BB_PROJECT");
        fill(&mut self.bitbucket.repo, "BB_REPO");
        // Credentials are taken as a unit: the environment is consulted only
        // when the file sets none of them.
        let bb = &mut self.bitbucket;
        if bb.user.is_none() && bb.password.is_none() && bb.token.is_none() {
            fill(&mut bb.user, "BB_USER");
            fill(&mut bb.password, "BB_PASSWORD");
            fill(&mut bb.token, "BB_TOKEN");
        }
        fill(&mut self.slack.webhook_url, "SLACK_WEBHOOK_URL");
        fill(&mut self.slack.channel, "SLACK_CHANNEL");

        if self.reminder.ignore_words.is_empty() {
            if let Some(words) = lookup("IGNORE_WORDS") {
                self.reminder.ignore_words = split_words(&words);
            }
        }
    }

    /// Apply a `PROJECT/REPO` override from the command line.
    pub fn override_repo(&mut self, value: &str) -> Result<(), ConfigError> {
        let coords = pr::parse_repo(value).map_err(|e| ConfigError::Invalid {
            key: "--repo",
            reason: e.to_string(),
        })?;
        self.bitbucket.project = Some(coords.project);
        self.bitbucket.repo = Some(coords.repo);
        Ok(())
    }

    /// Check required values and build the settings for this run.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let bitbucket = self.bitbucket;
        let base_url = require(bitbucket.base_url, "BB_URL")?;
        check_url(&base_url, "BB_URL")?;

        let repo = RepoCoordinates {
            project: require(bitbucket.project, "BB_PROJECT")?,
            repo: require(bitbucket.repo, "BB_REPO")?,
        };

        let credentials = match bitbucket.token {
            Some(token) => Credentials::Token(token),
            None => Credentials::Basic {
                user: require(bitbucket.user, "BB_USER")?,
                password: require(bitbucket.password, "BB_PASSWORD")?,
            },
        };

        let slack = self.slack;
        let webhook_url = require(slack.webhook_url, "SLACK_WEBHOOK_URL")?;
        check_url(&webhook_url, "SLACK_WEBHOOK_URL")?;

        Ok(Settings {
            bitbucket: BitbucketSettings {
                base_url,
                repo,
                credentials,
                timeout_secs: bitbucket.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            },
            slack: SlackSettings {
                webhook_url,
                channel: slack.channel,
                username: slack
                    .username
                    .unwrap_or_else(|| DEFAULT_SLACK_USERNAME.to_string()),
                icon_emoji: slack
                    .icon_emoji
                    .unwrap_or_else(|| DEFAULT_SLACK_ICON.to_string()),
                timeout_secs: slack.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
                users: slack.users,
            },
            reminder: self.reminder,
        })
    }
}

fn require(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn check_url(value: &str, key: &'static str) -> Result<(), ConfigError> {
    reqwest::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

/// Split a comma separated IGNORE_WORDS value, dropping blanks.
pub fn split_words(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
