//! Generic JSON webhook.

use crate::event::ErrorEvent;
use crate::http::send_checked;
use crate::notifier::{Notifier, policy_allows};
use async_trait::async_trait;
use chrono::Utc;
use config::WebhookConfig;
use errors::NotifierError;
use reqwest::{Client, Method};
use serde_json::{Value, json};

pub const EVENT_NAME: &str = "error.occurred";

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: Client
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn method(&self) -> Result<Method, NotifierError> {
        match self.config.method.to_ascii_uppercase().as_str() {
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            _ => Err(NotifierError::UnsupportedMethod {
                channel: self.name().to_string(),
                method: self.config.method.clone()
            })
        }
    }

    pub fn payload(&self, event: &ErrorEvent) -> Value {
        let group = &event.group;
        let occurrence = &event.occurrence;
        json!({
            "event": EVENT_NAME,
            "timestamp": Utc::now().to_rfc3339(),
            "app": event.app_name,
            "environment": event.environment,
            "error_group": {
                "id": group.id,
                "fingerprint": group.fingerprint,
                "exception_class": group.exception_class,
                "message": group.sanitized_message,
                "status": group.status.to_string(),
                "occurrences_count": group.occurrences_count,
                "file_path": group.file_path,
                "line_number": group.line_number,
                "method_name": group.method_name,
                "first_seen_at": group.first_seen_at.to_rfc3339(),
                "last_seen_at": group.last_seen_at.to_rfc3339(),
                "resolved_at": group.resolved_at.map(|at| at.to_rfc3339()),
                "recently_reopened": event.recently_reopened,
                "url": event.group_url()
            },
            "occurrence": {
                "id": occurrence.id,
                "error_group_id": occurrence.error_group_id,
                "exception_class": occurrence.exception_class,
                "message": occurrence.message,
                "backtrace": occurrence.backtrace,
                "environment": occurrence.environment,
                "request_url": occurrence.request_url,
                "request_method": occurrence.request_method,
                "ip_address": occurrence.ip_address,
                "user_id": occurrence.user_id,
                "user_type": occurrence.user_type,
                "user_identifier": occurrence.user_identifier,
                "hostname": occurrence.hostname,
                "process_id": occurrence.process_id,
                "local_variables": occurrence.local_variables,
                "created_at": occurrence.created_at.to_rfc3339()
            }
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn should_notify(&self, event: &ErrorEvent) -> bool {
        policy_allows(self.config.notify_policy, event)
    }

    async fn notify(&self, event: &ErrorEvent) -> Result<(), NotifierError> {
        let method = self.method()?;
        let mut request = self
            .client
            .request(method, &self.config.url)
            .json(&self.payload(event));
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        send_checked(self.name(), request).await
    }
}
