//! # Configuration Structures
//!
//! This module defines all configuration structures for Faultline.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization with per-field defaults
//! - Use `validator` for input validation
//! - Are plain data: the tracker and notifier crates build their runtime
//!   objects from them

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

/// Main configuration structure.
///
/// ## Usage
/// ```rust,no_run
/// use config::Config;
///
/// let config = Config::default();
/// println!("Reopen window: {}s", config.tracking.reopen_window_seconds);
/// ```
///
/// ## Fields
/// - `tracking`: what gets tracked and how occurrences are labelled
/// - `serializer`: redaction and size limits for captured variables
/// - `capture`: which source paths are eligible for local-variable capture
/// - `http`: timeouts shared by every outbound channel
/// - `notifiers`: configured notification channels
/// - `github`: issue-tracker integration
/// - `storage`: persistence backend
/// - `observability`: logging and metrics
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    #[validate(nested)]
    pub serializer: SerializerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub capture: CaptureConfig,

    #[serde(default)]
    #[validate(nested)]
    pub http: HttpConfig,

    #[serde(default)]
    #[validate(custom(function = "validate_notifiers"))]
    pub notifiers: Vec<NotifierConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub github: GithubConfig,

    #[serde(default)]
    #[validate(nested)]
    pub storage: StorageConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// Tracking rules.
///
/// ## Fields
/// - `enabled`: master switch (default: true)
/// - `app_name`: application name shown in notifications (default: "app")
/// - `environment`: deployment environment recorded on every occurrence
/// - `ignored_exceptions`: exception classes never tracked
/// - `ignore_paths`: request path prefixes never tracked
/// - `ignored_user_agents`: case-insensitive regexes (crawlers, bots)
/// - `reopen_window_seconds`: how long a reopened group counts as "recently
///   reopened" for notifications (default: 3600)
/// - `dashboard_url`: base URL used to link back to a group
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_app_name")]
    #[validate(length(min = 1, max = 255))]
    pub app_name: String,

    #[serde(default = "default_environment")]
    #[validate(length(min = 1, max = 64))]
    pub environment: String,

    #[serde(default)]
    pub ignored_exceptions: Vec<String>,

    #[serde(default)]
    pub ignore_paths: Vec<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_regexes"))]
    pub ignored_user_agents: Vec<String>,

    #[serde(default = "default_reopen_window_seconds")]
    #[validate(range(min = 1, max = 2_592_000))]
    pub reopen_window_seconds: u64,

    #[serde(default)]
    pub dashboard_url: Option<String>
}

fn default_true() -> bool {
    true
}

fn default_app_name() -> String {
    "app".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_reopen_window_seconds() -> u64 {
    3600
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: default_app_name(),
            environment: default_environment(),
            ignored_exceptions: Vec::new(),
            ignore_paths: Vec::new(),
            ignored_user_agents: Vec::new(),
            reopen_window_seconds: default_reopen_window_seconds(),
            dashboard_url: None
        }
    }
}

fn validate_regexes(patterns: &Vec<String>) -> Result<(), ValidationError> {
    for pattern in patterns {
        if regex::Regex::new(pattern).is_err() {
            let mut err = ValidationError::new("invalid_regex");
            err.message = Some(format!("Invalid regex: {pattern}").into());
            return Err(err);
        }
    }
    Ok(())
}

/// Redaction serializer limits.
///
/// `max_string_length` has a floor of 64 so the truncation marker always fits
/// inside the original length.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct SerializerConfig {
    #[serde(default = "default_sensitive_keys")]
    pub sensitive_keys: Vec<String>,

    #[serde(default = "default_max_string_length")]
    #[validate(range(min = 64, max = 100_000))]
    pub max_string_length: usize,

    #[serde(default = "default_max_depth")]
    #[validate(range(min = 1, max = 64))]
    pub max_depth: usize,

    #[serde(default = "default_max_collection_size")]
    #[validate(range(min = 1, max = 10_000))]
    pub max_collection_size: usize
}

pub fn default_sensitive_keys() -> Vec<String> {
    [
        "password",
        "passwd",
        "secret",
        "token",
        "api_key",
        "key",
        "authorization",
        "credit_card",
        "cvv",
        "ssn"
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_max_string_length() -> usize {
    500
}

fn default_max_depth() -> usize {
    10
}

fn default_max_collection_size() -> usize {
    100
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            sensitive_keys: default_sensitive_keys(),
            max_string_length: default_max_string_length(),
            max_depth: default_max_depth(),
            max_collection_size: default_max_collection_size()
        }
    }
}

/// Local-variable capture settings.
///
/// ## Fields
/// - `enabled`: arm capture scopes at all (default: true)
/// - `app_roots`: when non-empty, only paths containing one of these are
///   eligible
/// - `excluded_path_markers`: substrings marking dependency or toolchain
///   paths
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub app_roots: Vec<String>,

    #[serde(default = "default_excluded_path_markers")]
    pub excluded_path_markers: Vec<String>
}

pub fn default_excluded_path_markers() -> Vec<String> {
    [
        "cargo/registry/",
        "cargo/git/",
        "/rustc/",
        "/rustlib/",
        "/vendor/",
        "library/std/",
        "library/core/",
        "library/alloc/"
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_roots: Vec::new(),
            excluded_path_markers: default_excluded_path_markers()
        }
    }
}

/// Timeouts for outbound notifier and issue-tracker calls.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_seconds")]
    #[validate(range(min = 1, max = 60))]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 120))]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    #[validate(length(min = 1, max = 255))]
    pub user_agent: String
}

fn default_connect_timeout_seconds() -> u64 {
    5
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("faultline/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout_seconds(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent()
        }
    }
}

/// When a channel wants to hear about an occurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Every occurrence.
    #[default]
    Always,
    /// First occurrence of a group and occurrences that reopened it.
    NewAndReopened,
    /// Occurrence counts 1, 10, 100, 1000, ... plus reopens.
    Milestones
}

/// One configured notification channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotifierConfig {
    Slack(SlackConfig),
    Telegram(TelegramConfig),
    Resend(ResendConfig),
    Webhook(WebhookConfig)
}

impl NotifierConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Slack(_) => "slack",
            Self::Telegram(_) => "telegram",
            Self::Resend(_) => "resend",
            Self::Webhook(_) => "webhook"
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Self::Slack(c) if c.webhook_url.is_empty() => Err("slack.webhook_url is empty".into()),
            Self::Telegram(c) if c.bot_token.is_empty() || c.chat_id.is_empty() => {
                Err("telegram.bot_token and telegram.chat_id are required".into())
            }
            Self::Resend(c) if c.api_key.is_empty() || c.from.is_empty() || c.to.is_empty() => {
                Err("resend.api_key, resend.from and resend.to are required".into())
            }
            Self::Webhook(c) if c.url.is_empty() => Err("webhook.url is empty".into()),
            Self::Webhook(c)
                if !["POST", "PUT"]
                    .iter()
                    .any(|m| c.method.eq_ignore_ascii_case(m)) =>
            {
                Err(format!("webhook.method {} is not POST or PUT", c.method))
            }
            _ => Ok(())
        }
    }
}

fn validate_notifiers(notifiers: &Vec<NotifierConfig>) -> Result<(), ValidationError> {
    for notifier in notifiers {
        if let Err(reason) = notifier.check() {
            let mut err = ValidationError::new("invalid_notifier");
            err.message = Some(reason.into());
            return Err(err);
        }
    }
    Ok(())
}

/// Slack-compatible chat webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlackConfig {
    pub webhook_url: String,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default = "default_slack_username")]
    pub username: String,

    #[serde(default = "default_slack_icon")]
    pub icon_emoji: String,

    #[serde(default)]
    pub notify_policy: NotifyPolicy
}

fn default_slack_username() -> String {
    "Faultline".to_string()
}

fn default_slack_icon() -> String {
    ":rotating_light:".to_string()
}

impl SlackConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            channel: None,
            username: default_slack_username(),
            icon_emoji: default_slack_icon(),
            notify_policy: NotifyPolicy::default()
        }
    }
}

/// Telegram bot API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,

    pub chat_id: String,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub notify_policy: NotifyPolicy
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: default_telegram_api_base(),
            notify_policy: NotifyPolicy::default()
        }
    }
}

/// Resend transactional email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResendConfig {
    pub api_key: String,

    pub from: String,

    /// Accepts either a single address or a list.
    #[serde(deserialize_with = "one_or_many")]
    pub to: Vec<String>,

    #[serde(default = "default_resend_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub notify_policy: NotifyPolicy
}

fn default_resend_api_base() -> String {
    "https://api.resend.com".to_string()
}

impl ResendConfig {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from: from.into(),
            to,
            api_base: default_resend_api_base(),
            notify_policy: NotifyPolicy::default()
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>)
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(address) => vec![address],
        OneOrMany::Many(addresses) => addresses
    })
}

/// Generic outbound webhook.
///
/// `method` is checked when the notifier fires; anything other than POST or
/// PUT is reported as a soft dispatch failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookConfig {
    pub url: String,

    #[serde(default = "default_webhook_method")]
    pub method: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub notify_policy: NotifyPolicy
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_webhook_method(),
            headers: BTreeMap::new(),
            notify_policy: NotifyPolicy::default()
        }
    }
}

/// GitHub issue creation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct GithubConfig {
    /// `owner/repo`
    #[serde(default)]
    pub repo: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default = "default_github_api_base")]
    #[validate(length(min = 1))]
    pub api_base: String,

    #[serde(default = "default_product_name")]
    #[validate(length(min = 1, max = 64))]
    pub product_name: String
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_product_name() -> String {
    "Faultline".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: None,
            token: None,
            labels: Vec::new(),
            api_base: default_github_api_base(),
            product_name: default_product_name()
        }
    }
}

impl GithubConfig {
    pub fn is_configured(&self) -> bool {
        self.repo.as_deref().is_some_and(|r| !r.is_empty())
            && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Persistence backend.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct StorageConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_storage_backend")]
    #[validate(custom(function = "validate_storage_backend"))]
    pub backend: String,

    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_pool_size")]
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,

    #[serde(default = "default_storage_timeout_seconds")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_storage_timeout_seconds() -> u64 {
    30
}

fn validate_storage_backend(value: &str) -> Result<(), ValidationError> {
    match value {
        "memory" | "postgres" => Ok(()),
        _ => Err(ValidationError::new("Invalid storage backend"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_url: None,
            pool_size: default_pool_size(),
            timeout_seconds: default_storage_timeout_seconds()
        }
    }
}

/// Logging and metrics.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String,

    #[serde(default)]
    pub json_logs: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool
}

fn default_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("Invalid logging level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            logging_level: default_logging_level(),
            json_logs: false,
            metrics_enabled: true
        }
    }
}
