//! Resend transactional email.

use crate::event::{AlertSummary, ErrorEvent};
use crate::http::send_checked;
use crate::notifier::{Notifier, policy_allows};
use async_trait::async_trait;
use config::ResendConfig;
use errors::NotifierError;
use reqwest::Client;
use serde::Serialize;
use utils::{escape_html, truncate_with_ellipsis};

const COLOR_NEW: &str = "#dc2626";
const COLOR_REOPENED: &str = "#d97706";

#[derive(Debug, Serialize)]
pub struct EmailPayload {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String
}

pub struct ResendNotifier {
    config: ResendConfig,
    client: Client
}

impl ResendNotifier {
    pub fn new(config: ResendConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn payload(&self, event: &ErrorEvent) -> EmailPayload {
        let summary = AlertSummary::from_event(event);
        EmailPayload {
            from: self.config.from.clone(),
            to: self.config.to.clone(),
            subject: subject(&summary, &event.app_name),
            html: html(&summary, event)
        }
    }
}

pub fn subject(summary: &AlertSummary, app_name: &str) -> String {
    let prefix = if summary.reopened { "[REOPENED]" } else { "[ERROR]" };
    format!(
        "{} {}: {} ({})",
        prefix,
        summary.exception_class,
        truncate_with_ellipsis(&summary.message, 80),
        app_name
    )
}

fn row(label: &str, value: &str) -> String {
    format!(
        "<tr><td style=\"padding:6px 12px;color:#6b7280;white-space:nowrap\">{}</td>\
         <td style=\"padding:6px 12px;font-family:monospace\">{}</td></tr>",
        label, value
    )
}

pub fn html(summary: &AlertSummary, event: &ErrorEvent) -> String {
    let color = if summary.reopened { COLOR_REOPENED } else { COLOR_NEW };
    let badge = if summary.reopened {
        "<span style=\"background:#fef3c7;color:#92400e;padding:2px 8px;border-radius:4px;font-size:12px\">REOPENED</span>"
    } else {
        ""
    };

    let mut rows = vec![
        row("Exception", &escape_html(&summary.exception_class)),
        row("Message", &escape_html(&summary.message)),
        row("Occurrences", &summary.occurrences.to_string()),
        row("Location", &escape_html(&summary.location)),
        row("Environment", &escape_html(&event.environment)),
    ];
    if let Some(user) = &summary.user {
        rows.push(row("User", &escape_html(user)));
    }
    if let Some(url) = &summary.url {
        let request = format!(
            "{} {}",
            summary.method.as_deref().unwrap_or_default(),
            truncate_with_ellipsis(url, 60)
        );
        rows.push(row("Request", &escape_html(request.trim())));
    }

    let button = event
        .group_url()
        .map(|url| {
            format!(
                "<p style=\"margin:24px 0 0\"><a href=\"{}\" style=\"background:{};color:#fff;\
                 padding:10px 16px;border-radius:6px;text-decoration:none\">View error details</a></p>",
                escape_html(&url),
                color
            )
        })
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n\
         <body style=\"font-family:-apple-system,Segoe UI,sans-serif;background:#f9fafb;margin:0;padding:24px\">\n\
         <div style=\"max-width:640px;margin:0 auto;background:#fff;border-radius:8px;overflow:hidden\">\n\
         <div style=\"background:{color};color:#fff;padding:16px 24px\">\n\
         <h2 style=\"margin:0\">{title} {badge}</h2>\n</div>\n\
         <div style=\"padding:16px 24px\">\n<table style=\"border-collapse:collapse;width:100%\">\n{rows}\n</table>\n{button}\n</div>\n\
         </div>\n</body>\n</html>\n",
        color = color,
        title = escape_html(&summary.title),
        badge = badge,
        rows = rows.join("\n"),
        button = button
    )
}

#[async_trait]
impl Notifier for ResendNotifier {
    fn name(&self) -> &str {
        "resend"
    }

    fn should_notify(&self, event: &ErrorEvent) -> bool {
        policy_allows(self.config.notify_policy, event)
    }

    async fn notify(&self, event: &ErrorEvent) -> Result<(), NotifierError> {
        let url = format!("{}/emails", self.config.api_base.trim_end_matches('/'));
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&self.payload(event));
        send_checked(self.name(), request).await
    }
}
