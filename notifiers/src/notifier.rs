use crate::event::ErrorEvent;
use crate::resend::ResendNotifier;
use crate::slack::SlackNotifier;
use crate::telegram::TelegramNotifier;
use crate::webhook::WebhookNotifier;
use async_trait::async_trait;
use config::{NotifierConfig, NotifyPolicy};
use errors::NotifierError;
use reqwest::Client;
use std::sync::Arc;

/// One outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs, metrics and dispatch reports.
    fn name(&self) -> &str;

    fn should_notify(&self, _event: &ErrorEvent) -> bool {
        true
    }

    async fn notify(&self, event: &ErrorEvent) -> Result<(), NotifierError>;
}

/// Whether `policy` lets `event` through.
pub fn policy_allows(policy: NotifyPolicy, event: &ErrorEvent) -> bool {
    match policy {
        NotifyPolicy::Always => true,
        NotifyPolicy::NewAndReopened => event.group.is_first_occurrence() || event.reopened,
        NotifyPolicy::Milestones => event.reopened || is_milestone(event.group.occurrences_count)
    }
}

/// 1, 10, 100, 1000, ...
fn is_milestone(count: i64) -> bool {
    if count < 1 {
        return false;
    }
    let mut n = count;
    while n % 10 == 0 {
        n /= 10;
    }
    n == 1
}

pub fn build_notifier(config: &NotifierConfig, client: Client) -> Arc<dyn Notifier> {
    match config {
        NotifierConfig::Slack(c) => Arc::new(SlackNotifier::new(c.clone(), client)),
        NotifierConfig::Telegram(c) => Arc::new(TelegramNotifier::new(c.clone(), client)),
        NotifierConfig::Resend(c) => Arc::new(ResendNotifier::new(c.clone(), client)),
        NotifierConfig::Webhook(c) => Arc::new(WebhookNotifier::new(c.clone(), client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestones() {
        let hits: Vec<i64> = (0..=2000).filter(|n| is_milestone(*n)).collect();
        assert_eq!(hits, vec![1, 10, 100, 1000]);
    }

    #[test]
    fn test_build_notifier_names() {
        let client = Client::new();
        let slack = build_notifier(
            &NotifierConfig::Slack(config::SlackConfig::new("https://hooks.example.com/x")),
            client.clone()
        );
        let webhook = build_notifier(
            &NotifierConfig::Webhook(config::WebhookConfig::new("https://example.com/hook")),
            client
        );
        assert_eq!(slack.name(), "slack");
        assert_eq!(webhook.name(), "webhook");
    }
}
