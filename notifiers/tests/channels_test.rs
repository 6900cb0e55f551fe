//! Wire-level tests for every notification channel against a mock server.

use config::{NotifyPolicy, ResendConfig, SlackConfig, TelegramConfig, WebhookConfig};
use errors::NotifierError;
use notifiers::{
    Notifier, ResendNotifier, SlackNotifier, TelegramNotifier, WebhookNotifier
};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use testing::{sample_backtrace, sample_event};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_slack_posts_attachment() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/T000/B000/XXX"))
        .and(body_partial_json(json!({
            "username": "Faultline",
            "icon_emoji": ":rotating_light:",
            "channel": "#errors"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = SlackConfig::new(format!("{}/services/T000/B000/XXX", mock_server.uri()));
    config.channel = Some("#errors".to_string());
    let notifier = SlackNotifier::new(config, Client::new());

    notifier.notify(&sample_event(3, false)).await.unwrap();
}

#[tokio::test]
async fn test_slack_payload_fields() {
    let notifier = SlackNotifier::new(SlackConfig::new("https://hooks.example.com"), Client::new());

    let payload = serde_json::to_value(notifier.payload(&sample_event(5, false))).unwrap();
    let attachment = &payload["attachments"][0];
    assert_eq!(attachment["color"], "danger");
    assert!(attachment.get("pretext").is_none());
    let fields = attachment["fields"].as_array().unwrap();
    let field = |title: &str| {
        fields
            .iter()
            .find(|f| f["title"] == title)
            .map(|f| f["value"].clone())
    };
    assert_eq!(field("Exception"), Some(json!("shop::orders::OrderNotFound")));
    assert_eq!(field("Occurrences"), Some(json!("5")));
    assert_eq!(field("Location"), Some(json!("src/orders/checkout.rs:42")));
    assert_eq!(field("User"), Some(json!("jane@example.com")));
    assert!(payload.get("channel").is_none());

    let reopened = serde_json::to_value(notifier.payload(&sample_event(5, true))).unwrap();
    assert_eq!(reopened["attachments"][0]["color"], "warning");
    assert!(
        reopened["attachments"][0]["pretext"]
            .as_str()
            .unwrap()
            .contains("previously resolved")
    );
}

#[tokio::test]
async fn test_slack_rejection_is_reported() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_payload"))
        .mount(&mock_server)
        .await;

    let notifier = SlackNotifier::new(SlackConfig::new(mock_server.uri()), Client::new());
    let err = notifier.notify(&sample_event(1, false)).await.unwrap_err();
    match err {
        NotifierError::Rejected {
            channel,
            status,
            body
        } => {
            assert_eq!(channel, "slack");
            assert_eq!(status, 400);
            assert_eq!(body, "invalid_payload");
        }
        other => panic!("unexpected error: {other:?}")
    }
}

#[tokio::test]
async fn test_telegram_sends_html_form() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123456789:ABCDEF/sendMessage"))
        .and(body_string_contains("chat_id=-1001234567890"))
        .and(body_string_contains("parse_mode=HTML"))
        .and(body_string_contains("disable_web_page_preview=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = TelegramConfig::new("123456789:ABCDEF", "-1001234567890");
    config.api_base = mock_server.uri();
    let notifier = TelegramNotifier::new(config, Client::new());

    notifier.notify(&sample_event(2, false)).await.unwrap();
}

#[test]
fn test_telegram_message_format() {
    let notifier = TelegramNotifier::new(TelegramConfig::new("t", "c"), Client::new());

    let message = notifier.message(&sample_event(2, false));
    assert!(message.contains("<b>Type:</b> <code>shop::orders::OrderNotFound</code>"));
    assert!(message.contains("<b>Message:</b>"));
    assert!(message.contains("<b>Count:</b> 2"));
    assert!(message.contains("<b>Location:</b>"));
    assert!(message.contains("<b>User:</b> jane@example.com"));
    assert!(message.contains("<b>URL:</b> POST https://shop.example.com/orders/42/checkout"));
    assert!(message.contains("Couldn&#39;t find Order"));
    assert!(!message.contains("previously resolved"));

    let reopened = notifier.message(&sample_event(2, true));
    assert!(reopened.contains("<i>This error was previously resolved"));
}

#[tokio::test]
async fn test_resend_posts_email() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Authorization", "Bearer re_test"))
        .and(body_partial_json(json!({
            "from": "alerts@example.com",
            "to": ["oncall@example.com"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "email_1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = ResendConfig::new(
        "re_test",
        "alerts@example.com",
        vec!["oncall@example.com".to_string()]
    );
    config.api_base = mock_server.uri();
    let notifier = ResendNotifier::new(config, Client::new());

    notifier.notify(&sample_event(1, false)).await.unwrap();
}

#[test]
fn test_resend_subject_and_html() {
    let notifier = ResendNotifier::new(
        ResendConfig::new("k", "a@example.com", vec!["b@example.com".to_string()]),
        Client::new()
    );

    let payload = notifier.payload(&sample_event(7, false));
    assert!(payload.subject.starts_with("[ERROR]"));
    assert!(payload.subject.contains("shop::orders::OrderNotFound"));
    assert!(payload.html.contains("<!DOCTYPE html>"));
    assert!(payload.html.contains("#dc2626"));
    assert!(payload.html.contains("src/orders/checkout.rs:42"));
    assert!(payload.html.contains("jane@example.com"));
    assert!(!payload.html.contains("REOPENED"));

    let reopened = notifier.payload(&sample_event(7, true));
    assert!(reopened.subject.starts_with("[REOPENED]"));
    assert!(reopened.html.contains("REOPENED"));
    assert!(reopened.html.contains("#d97706"));
}

#[tokio::test]
async fn test_webhook_put_with_custom_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/hooks/errors"))
        .and(header("X-API-Key", "secret"))
        .and(body_partial_json(json!({
            "event": "error.occurred",
            "app": "Shop",
            "environment": "test",
            "error_group": {
                "exception_class": "shop::orders::OrderNotFound",
                "occurrences_count": 4,
                "recently_reopened": false
            },
            "occurrence": {
                "exception_class": "shop::orders::OrderNotFound",
                "environment": "test",
                "request_method": "POST",
                "ip_address": "203.0.113.7",
                "local_variables": { "order_id": 42, "password": "[FILTERED]" }
            }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = WebhookConfig::new(format!("{}/hooks/errors", mock_server.uri()));
    config.method = "PUT".to_string();
    config
        .headers
        .insert("X-API-Key".to_string(), "secret".to_string());
    let notifier = WebhookNotifier::new(config, Client::new());

    notifier.notify(&sample_event(4, false)).await.unwrap();
}

#[test]
fn test_webhook_payload_carries_full_records() {
    let mut event = sample_event(3, false);
    let resolved_at = Utc::now();
    event.group.resolved_at = Some(resolved_at);
    let notifier = WebhookNotifier::new(WebhookConfig::new("https://example.com/hook"), Client::new());

    let payload = notifier.payload(&event);

    let group = &payload["error_group"];
    assert_eq!(group["resolved_at"], json!(resolved_at.to_rfc3339()));

    let occurrence = &payload["occurrence"];
    assert_eq!(occurrence["error_group_id"], json!(event.group.id));
    assert_eq!(occurrence["exception_class"], json!("shop::orders::OrderNotFound"));
    assert_eq!(occurrence["backtrace"], json!(sample_backtrace()));
    assert_eq!(occurrence["environment"], json!("test"));
    assert_eq!(occurrence["process_id"], json!(event.occurrence.process_id));
    assert_eq!(occurrence["local_variables"]["order_id"], json!(42));
    assert_eq!(occurrence["local_variables"]["password"], json!("[FILTERED]"));

    event.group.resolved_at = None;
    event.occurrence.local_variables = None;
    let payload = notifier.payload(&event);
    assert!(payload["error_group"]["resolved_at"].is_null());
    assert!(payload["occurrence"]["local_variables"].is_null());
}

#[tokio::test]
async fn test_webhook_unsupported_method_fails_without_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = WebhookConfig::new(mock_server.uri());
    config.method = "DELETE".to_string();
    let notifier = WebhookNotifier::new(config, Client::new());

    let err = notifier.notify(&sample_event(1, false)).await.unwrap_err();
    assert!(matches!(err, NotifierError::UnsupportedMethod { .. }));
}

#[test]
fn test_channel_policies() {
    let mut config = SlackConfig::new("https://hooks.example.com");
    config.notify_policy = NotifyPolicy::NewAndReopened;
    let notifier = SlackNotifier::new(config, Client::new());

    assert!(notifier.should_notify(&sample_event(1, false)));
    assert!(!notifier.should_notify(&sample_event(2, false)));
    assert!(notifier.should_notify(&sample_event(2, true)));

    let mut config = WebhookConfig::new("https://example.com/hook");
    config.notify_policy = NotifyPolicy::Milestones;
    let notifier = WebhookNotifier::new(config, Client::new());

    assert!(notifier.should_notify(&sample_event(10, false)));
    assert!(!notifier.should_notify(&sample_event(11, false)));
    assert!(notifier.should_notify(&sample_event(100, false)));
}
