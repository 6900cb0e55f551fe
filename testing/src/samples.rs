use chrono::Utc;
use fl_core::exception::ExceptionInfo;
use fl_core::types::{ErrorGroup, ErrorOccurrence, ErrorStatus, NewErrorGroup, NewErrorOccurrence};
use notifiers::ErrorEvent;
use serde_json::{Map, Value, json};
use uuid::Uuid;

pub fn sample_backtrace() -> Vec<String> {
    vec![
        "src/orders/checkout.rs:42:in `shop::orders::checkout::place`".to_string(),
        "src/orders/mod.rs:17:in `shop::orders::handle`".to_string(),
        "/root/.cargo/registry/src/index.crates.io-6f17d22bba15001f/tokio-1.35.0/src/runtime/task/core.rs:328:in `tokio::runtime::task::core::Core::poll`".to_string(),
    ]
}

pub fn sample_exception() -> ExceptionInfo {
    ExceptionInfo {
        class: "shop::orders::OrderNotFound".to_string(),
        message: "Couldn't find Order with id=42".to_string(),
        backtrace: sample_backtrace(),
        location: None
    }
}

pub fn sample_new_group(fingerprint: &str) -> NewErrorGroup {
    NewErrorGroup {
        fingerprint: fingerprint.to_string(),
        exception_class: "shop::orders::OrderNotFound".to_string(),
        sanitized_message: "Couldn't find Order with id=N".to_string(),
        file_path: Some("src/orders/checkout.rs".to_string()),
        line_number: Some(42),
        method_name: Some("shop::orders::checkout::place".to_string()),
        seen_at: Utc::now()
    }
}

pub fn sample_new_occurrence() -> NewErrorOccurrence {
    let mut locals = Map::new();
    locals.insert("order_id".to_string(), json!(42));
    locals.insert("password".to_string(), Value::String("[FILTERED]".to_string()));

    NewErrorOccurrence {
        exception_class: "shop::orders::OrderNotFound".to_string(),
        message: "Couldn't find Order with id=42".to_string(),
        backtrace: sample_backtrace(),
        environment: "test".to_string(),
        hostname: "test-host".to_string(),
        process_id: i64::from(std::process::id()),
        request_method: Some("POST".to_string()),
        request_url: Some("https://shop.example.com/orders/42/checkout".to_string()),
        ip_address: Some("203.0.113.7".to_string()),
        user_id: Some("7".to_string()),
        user_type: Some("Customer".to_string()),
        user_identifier: Some("jane@example.com".to_string()),
        local_variables: Some(locals)
    }
}

/// A stored-looking group with the given occurrence count.
pub fn sample_group(occurrences_count: i64) -> ErrorGroup {
    let mut group = sample_new_group("sample-fingerprint").into_group(Uuid::new_v4());
    group.occurrences_count = occurrences_count;
    group
}

pub fn sample_occurrence(group: &ErrorGroup) -> ErrorOccurrence {
    sample_new_occurrence().into_occurrence(Uuid::new_v4(), group.id, Utc::now())
}

/// Event for a group seen `occurrences_count` times; `reopened` marks both
/// the occurrence and the group as just reopened.
pub fn sample_event(occurrences_count: i64, reopened: bool) -> ErrorEvent {
    let mut group = sample_group(occurrences_count);
    if reopened {
        group.status = ErrorStatus::Unresolved;
        group.reopened_at = Some(Utc::now());
    }
    let occurrence = sample_occurrence(&group);
    ErrorEvent {
        group,
        occurrence,
        recently_reopened: reopened,
        reopened,
        app_name: "Shop".to_string(),
        environment: "test".to_string(),
        dashboard_url: None
    }
}
