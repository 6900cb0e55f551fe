//! Slack-compatible incoming webhook.

use crate::event::{AlertSummary, ErrorEvent};
use crate::http::send_checked;
use crate::notifier::{Notifier, policy_allows};
use async_trait::async_trait;
use config::SlackConfig;
use errors::NotifierError;
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SlackPayload {
    pub username: String,
    pub icon_emoji: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub attachments: Vec<SlackAttachment>
}

#[derive(Debug, Serialize)]
pub struct SlackAttachment {
    pub color: &'static str,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    pub fields: Vec<SlackField>,
    pub footer: String,
    pub ts: i64
}

#[derive(Debug, Serialize)]
pub struct SlackField {
    pub title: &'static str,
    pub value: String,
    pub short: bool
}

pub struct SlackNotifier {
    config: SlackConfig,
    client: Client
}

impl SlackNotifier {
    pub fn new(config: SlackConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn payload(&self, event: &ErrorEvent) -> SlackPayload {
        let summary = AlertSummary::from_event(event);

        let mut fields = vec![
            SlackField {
                title: "Exception",
                value: summary.exception_class.clone(),
                short: true
            },
            SlackField {
                title: "Occurrences",
                value: summary.occurrences.to_string(),
                short: true
            },
            SlackField {
                title: "Location",
                value: summary.location.clone(),
                short: false
            },
        ];
        if let Some(user) = &summary.user {
            fields.push(SlackField {
                title: "User",
                value: user.clone(),
                short: true
            });
        }
        if let Some(request) = summary.request_line() {
            fields.push(SlackField {
                title: "Request",
                value: request,
                short: false
            });
        }

        SlackPayload {
            username: self.config.username.clone(),
            icon_emoji: self.config.icon_emoji.clone(),
            channel: self.config.channel.clone(),
            attachments: vec![SlackAttachment {
                color: if summary.reopened { "warning" } else { "danger" },
                title: format!("{} {}", summary.emoji, summary.message),
                title_link: event.group_url(),
                pretext: summary
                    .reopened
                    .then(|| "This error was previously resolved and has reoccurred".to_string()),
                fields,
                footer: format!("{} | {}", event.app_name, event.environment),
                ts: summary.timestamp.timestamp()
            }]
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    fn should_notify(&self, event: &ErrorEvent) -> bool {
        policy_allows(self.config.notify_policy, event)
    }

    async fn notify(&self, event: &ErrorEvent) -> Result<(), NotifierError> {
        let request = self
            .client
            .post(&self.config.webhook_url)
            .json(&self.payload(event));
        send_checked(self.name(), request).await
    }
}
