//! # Notifiers
//!
//! Outbound side of the tracker: every channel implements [`Notifier`] and
//! [`NotifierDispatch`] fans an [`ErrorEvent`] out to all of them. Channel
//! failures are logged and counted, never raised.
//!
//! Channels:
//! - [`slack::SlackNotifier`]: Slack-compatible incoming webhook
//! - [`telegram::TelegramNotifier`]: Telegram bot API
//! - [`resend::ResendNotifier`]: Resend transactional email
//! - [`webhook::WebhookNotifier`]: generic JSON webhook
//!
//! [`github::GithubIssueCreator`] opens a GitHub issue for a group on demand.

pub mod dispatch;
pub mod event;
pub mod github;
pub mod http;
pub mod notifier;
pub mod resend;
pub mod slack;
pub mod telegram;
pub mod webhook;

pub use dispatch::{ChannelReport, DispatchReport, NotifierDispatch};
pub use event::{AlertSummary, ErrorEvent};
pub use github::{CreatedIssue, GithubIssueCreator};
pub use http::build_http_client;
pub use notifier::{Notifier, build_notifier, policy_allows};
pub use resend::ResendNotifier;
pub use slack::SlackNotifier;
pub use telegram::TelegramNotifier;
pub use webhook::WebhookNotifier;
