//! Telegram bot API, HTML parse mode.

use crate::event::{AlertSummary, ErrorEvent};
use crate::http::send_checked;
use crate::notifier::{Notifier, policy_allows};
use async_trait::async_trait;
use config::TelegramConfig;
use errors::NotifierError;
use reqwest::Client;
use utils::escape_html;

pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    pub fn message(&self, event: &ErrorEvent) -> String {
        let summary = AlertSummary::from_event(event);
        let mut lines = vec![format!("<b>{}</b>", escape_html(&summary.title))];

        if summary.reopened {
            lines.push("<i>This error was previously resolved and has reoccurred.</i>".to_string());
        }
        lines.push(String::new());
        lines.push(format!(
            "<b>Type:</b> <code>{}</code>",
            escape_html(&summary.exception_class)
        ));
        lines.push(format!("<b>Message:</b> {}", escape_html(&summary.message)));
        lines.push(format!("<b>Count:</b> {}", summary.occurrences));
        lines.push(format!(
            "<b>Location:</b> <code>{}</code>",
            escape_html(&summary.location)
        ));
        if let Some(user) = &summary.user {
            lines.push(format!("<b>User:</b> {}", escape_html(user)));
        }
        if let Some(request) = summary.request_line() {
            lines.push(format!("<b>URL:</b> {}", escape_html(&request)));
        }
        if let Some(url) = event.group_url() {
            lines.push(String::new());
            lines.push(format!("<a href=\"{}\">View details</a>", escape_html(&url)));
        }

        lines.join("\n")
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn should_notify(&self, event: &ErrorEvent) -> bool {
        policy_allows(self.config.notify_policy, event)
    }

    async fn notify(&self, event: &ErrorEvent) -> Result<(), NotifierError> {
        let text = self.message(event);
        let form = [
            ("chat_id", self.config.chat_id.as_str()),
            ("text", text.as_str()),
            ("parse_mode", "HTML"),
            ("disable_web_page_preview", "true")
        ];
        let request = self.client.post(self.endpoint()).form(&form);
        send_checked(self.name(), request).await
    }
}
