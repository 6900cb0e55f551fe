//! Fan-out of one event to every configured channel.

use crate::event::ErrorEvent;
use crate::http::build_http_client;
use crate::notifier::{Notifier, build_notifier};
use config::{HttpConfig, NotifierConfig};
use errors::NotifierError;
use futures_util::FutureExt;
use observability::{DispatchOutcome, Telemetry};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// What happened on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: String,
    pub outcome: DispatchOutcome,
    pub error: Option<String>
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub channels: Vec<ChannelReport>
}

impl DispatchReport {
    fn count(&self, outcome: DispatchOutcome) -> usize {
        self.channels.iter().filter(|c| c.outcome == outcome).count()
    }

    pub fn delivered(&self) -> usize {
        self.count(DispatchOutcome::Delivered)
    }

    pub fn skipped(&self) -> usize {
        self.count(DispatchOutcome::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(DispatchOutcome::Failed)
    }

    pub fn outcome_for(&self, channel: &str) -> Option<DispatchOutcome> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| c.outcome)
    }
}

/// Channels are attempted one after another and independently: a failure or
/// panic in one never prevents the others from running.
#[derive(Clone, Default)]
pub struct NotifierDispatch {
    notifiers: Vec<Arc<dyn Notifier>>
}

impl NotifierDispatch {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Build every configured channel on one shared HTTP client.
    pub fn from_config(
        configs: &[NotifierConfig],
        http: &HttpConfig
    ) -> Result<Self, NotifierError> {
        let client = build_http_client(http).map_err(|e| NotifierError::Transport {
            channel: "http_client".to_string(),
            reason: e.to_string()
        })?;
        let notifiers = configs
            .iter()
            .map(|config| build_notifier(config, client.clone()))
            .collect();
        Ok(Self { notifiers })
    }

    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.notifiers.iter().map(|n| n.name().to_string()).collect()
    }

    pub async fn dispatch(&self, event: &ErrorEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        for notifier in &self.notifiers {
            let channel = notifier.name().to_string();
            let (outcome, error) = Self::run_one(notifier.as_ref(), event).await;

            match (&outcome, &error) {
                (DispatchOutcome::Failed, Some(reason)) => tracing::warn!(
                    channel = %channel,
                    group_id = %event.group.id,
                    error = %reason,
                    "Notification failed"
                ),
                (DispatchOutcome::Delivered, _) => tracing::debug!(
                    channel = %channel,
                    group_id = %event.group.id,
                    "Notification delivered"
                ),
                _ => {}
            }
            Telemetry::record_notification(&channel, outcome);
            report.channels.push(ChannelReport {
                channel,
                outcome,
                error
            });
        }
        report
    }

    async fn run_one(
        notifier: &dyn Notifier,
        event: &ErrorEvent
    ) -> (DispatchOutcome, Option<String>) {
        let should = std::panic::catch_unwind(AssertUnwindSafe(|| notifier.should_notify(event)));
        match should {
            Ok(true) => {}
            Ok(false) => return (DispatchOutcome::Skipped, None),
            Err(_) => {
                return (
                    DispatchOutcome::Failed,
                    Some("should_notify panicked".to_string())
                );
            }
        }

        match AssertUnwindSafe(notifier.notify(event)).catch_unwind().await {
            Ok(Ok(())) => (DispatchOutcome::Delivered, None),
            Ok(Err(e)) => (DispatchOutcome::Failed, Some(e.to_string())),
            Err(_) => (DispatchOutcome::Failed, Some("notifier panicked".to_string()))
        }
    }
}

impl std::fmt::Debug for NotifierDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierDispatch")
            .field("channels", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{SlackConfig, WebhookConfig};

    #[test]
    fn test_from_config_builds_every_channel() {
        let configs = vec![
            NotifierConfig::Slack(SlackConfig::new("https://hooks.example.com/a")),
            NotifierConfig::Webhook(WebhookConfig::new("https://example.com/hook")),
        ];
        let dispatch = NotifierDispatch::from_config(&configs, &HttpConfig::default()).unwrap();
        assert_eq!(dispatch.len(), 2);
        assert_eq!(dispatch.names(), vec!["slack", "webhook"]);
    }

    #[test]
    fn test_report_counts() {
        let report = DispatchReport {
            channels: vec![
                ChannelReport {
                    channel: "slack".to_string(),
                    outcome: DispatchOutcome::Delivered,
                    error: None
                },
                ChannelReport {
                    channel: "webhook".to_string(),
                    outcome: DispatchOutcome::Failed,
                    error: Some("boom".to_string())
                },
            ]
        };
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 0);
        assert_eq!(report.outcome_for("webhook"), Some(DispatchOutcome::Failed));
    }
}
