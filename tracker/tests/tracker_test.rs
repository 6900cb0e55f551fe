use config::Config;
use errors::{IssueError, TrackingError};
use fl_core::capture::CaptureScope;
use fl_core::capture_locals;
use fl_core::exception::ExceptionInfo;
use fl_core::traits::ErrorStore;
use fl_core::types::{ErrorStatus, TrackContext, UserInfo};
use notifiers::{GithubIssueCreator, NotifierDispatch};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use storage::InMemoryErrorStore;
use testing::{FailingNotifier, RecordingNotifier, sample_exception};
use tracker::Tracker;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    store: Arc<InMemoryErrorStore>,
    recorder: Arc<RecordingNotifier>,
    tracker: Tracker
}

fn harness_with(config: Config) -> Harness {
    let store = Arc::new(InMemoryErrorStore::new());
    let recorder = Arc::new(RecordingNotifier::new("recording"));
    let dispatch = NotifierDispatch::new(vec![recorder.clone()]);
    let tracker = Tracker::new(store.clone(), &config, dispatch);
    Harness {
        store,
        recorder,
        tracker
    }
}

fn harness() -> Harness {
    harness_with(Config::default())
}

fn exception_with_message(message: &str) -> ExceptionInfo {
    ExceptionInfo {
        message: message.to_string(),
        ..sample_exception()
    }
}

#[tokio::test]
async fn test_repeated_failure_is_grouped() {
    let h = harness();

    let first = h
        .tracker
        .track(&exception_with_message("Couldn't find Order with id=42"), TrackContext::default())
        .await
        .unwrap()
        .unwrap();
    let second = h
        .tracker
        .track(&exception_with_message("Couldn't find Order with id=43"), TrackContext::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.error_group_id, second.error_group_id);
    assert_eq!(h.store.group_count(), 1);
    assert_eq!(h.store.occurrence_count(), 2);

    let group = h.store.groups().pop().unwrap();
    assert_eq!(group.occurrences_count, 2);
    assert_eq!(group.sanitized_message, "Couldn't find Order with id=N");
    assert_eq!(group.file_path.as_deref(), Some("src/orders/checkout.rs"));
    assert_eq!(group.line_number, Some(42));

    let events = h.recorder.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].group.occurrences_count, 1);
    assert_eq!(events[1].group.occurrences_count, 2);
    assert_eq!(events[0].app_name, "app");
}

#[tokio::test]
async fn test_different_classes_get_different_groups() {
    let h = harness();
    let other = ExceptionInfo {
        class: "shop::payments::CardDeclined".to_string(),
        ..sample_exception()
    };

    h.tracker.track(&sample_exception(), TrackContext::default()).await.unwrap();
    h.tracker.track(&other, TrackContext::default()).await.unwrap();

    assert_eq!(h.store.group_count(), 2);
}

#[tokio::test]
async fn test_ignored_class_is_not_stored() {
    let mut config = Config::default();
    config.tracking.ignored_exceptions = vec!["shop::orders::OrderNotFound".to_string()];
    let h = harness_with(config);

    let result = h.tracker.track(&sample_exception(), TrackContext::default()).await.unwrap();

    assert!(result.is_none());
    assert_eq!(h.store.group_count(), 0);
    assert_eq!(h.recorder.count(), 0);
}

#[tokio::test]
async fn test_disabled_tracker_stores_nothing() {
    let mut config = Config::default();
    config.tracking.enabled = false;
    let h = harness_with(config);

    let result = h.tracker.track(&sample_exception(), TrackContext::default()).await.unwrap();

    assert!(result.is_none());
    assert_eq!(h.store.group_count(), 0);
    assert!(!h.tracker.new_scope().is_armed());
}

#[tokio::test]
async fn test_before_track_can_veto() {
    let h = harness();
    let tracker = h
        .tracker
        .with_before_track(|exception, _context| !exception.message.contains("id=42"));

    let vetoed = tracker.track(&sample_exception(), TrackContext::default()).await.unwrap();
    let kept = tracker
        .track(&exception_with_message("Couldn't find Order with id=7"), TrackContext::default())
        .await
        .unwrap();

    assert!(vetoed.is_none());
    assert!(kept.is_some());
    assert_eq!(h.store.occurrence_count(), 1);
}

#[tokio::test]
async fn test_panicking_before_track_skips() {
    let h = harness();
    let tracker = h.tracker.with_before_track(|_, _| panic!("predicate bug"));

    let result = tracker.track(&sample_exception(), TrackContext::default()).await.unwrap();

    assert!(result.is_none());
    assert_eq!(h.store.group_count(), 0);
}

#[tokio::test]
async fn test_after_track_failure_is_swallowed() {
    let h = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let tracker = h.tracker.with_after_track(move |_occurrence| {
        seen.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("audit sink unavailable")
    });

    let result = tracker.track(&sample_exception(), TrackContext::default()).await.unwrap();

    assert!(result.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.recorder.count(), 1);
}

#[tokio::test]
async fn test_failing_channel_does_not_fail_tracking() {
    let store = Arc::new(InMemoryErrorStore::new());
    let recorder = Arc::new(RecordingNotifier::new("recording"));
    let dispatch = NotifierDispatch::new(vec![
        Arc::new(FailingNotifier::new("slack")),
        recorder.clone(),
    ]);
    let tracker = Tracker::new(store.clone(), &Config::default(), dispatch);

    let result = tracker.track(&sample_exception(), TrackContext::default()).await;

    assert!(matches!(result, Ok(Some(_))));
    assert_eq!(recorder.count(), 1);
}

#[tokio::test]
async fn test_resolved_group_reopens() {
    let h = harness();
    let first = h
        .tracker
        .track(&sample_exception(), TrackContext::default())
        .await
        .unwrap()
        .unwrap();

    let resolved = h.tracker.resolve(first.error_group_id).await.unwrap();
    assert_eq!(resolved.status, ErrorStatus::Resolved);
    assert!(resolved.resolved_at.is_some());

    h.tracker.track(&sample_exception(), TrackContext::default()).await.unwrap();

    let events = h.recorder.events();
    let last = events.last().unwrap();
    assert!(last.reopened);
    assert!(last.recently_reopened);
    assert_eq!(last.group.status, ErrorStatus::Unresolved);
    assert!(last.group.reopened_at.is_some());
    assert!(!events[0].reopened);
}

#[tokio::test]
async fn test_ignored_group_is_stored_but_not_notified() {
    let h = harness();
    let first = h
        .tracker
        .track(&sample_exception(), TrackContext::default())
        .await
        .unwrap()
        .unwrap();
    h.tracker.ignore(first.error_group_id).await.unwrap();

    h.tracker.track(&sample_exception(), TrackContext::default()).await.unwrap();

    assert_eq!(h.store.occurrence_count(), 2);
    assert_eq!(h.recorder.count(), 1);
}

#[tokio::test]
async fn test_status_change_on_unknown_group() {
    let h = harness();
    let result = h.tracker.unresolve(uuid::Uuid::new_v4()).await;
    assert!(matches!(result, Err(TrackingError::GroupNotFound { .. })));
}

#[tokio::test]
async fn test_captured_locals_are_redacted() {
    let h = harness();
    let scope: CaptureScope = h.tracker.new_scope();
    capture_locals!(scope, "order_id" => 42, "password" => "hunter2");

    let context = TrackContext::default().with_captured(scope.take());
    let occurrence = h
        .tracker
        .track(&sample_exception(), context)
        .await
        .unwrap()
        .unwrap();

    let locals = occurrence.parsed_local_variables();
    assert_eq!(locals["order_id"], json!(42));
    assert_eq!(locals["password"], json!("[FILTERED]"));

    let group = h.store.groups().pop().unwrap();
    assert_eq!(group.file_path.as_deref(), Some(file!()));
    assert!(
        group
            .method_name
            .as_deref()
            .is_some_and(|m| m.ends_with("test_captured_locals_are_redacted"))
    );
}

#[tokio::test]
async fn test_context_entries_are_stored() {
    let h = harness();
    let user = UserInfo {
        id: "7".to_string(),
        user_type: Some("Customer".to_string()),
        identifier: Some("jane@example.com".to_string())
    };
    let context = TrackContext::default()
        .with_user(user)
        .with_custom_data(json!({"plan": "pro", "api_key": "sk_live_123"}))
        .with_tag("severity", "warning");

    let occurrence = h
        .tracker
        .track(&sample_exception(), context)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(occurrence.user_identifier.as_deref(), Some("jane@example.com"));

    let contexts = h.store.list_contexts(occurrence.id).await.unwrap();
    let custom = contexts
        .iter()
        .find(|c| c.key == "custom_data")
        .and_then(|c| c.parsed_value())
        .unwrap();
    assert_eq!(custom["plan"], json!("pro"));
    assert_eq!(custom["api_key"], json!("[FILTERED]"));

    let severity = contexts.iter().find(|c| c.key == "severity").unwrap();
    assert_eq!(severity.parsed_value(), Some(json!("warning")));
}

#[tokio::test]
async fn test_create_issue_requires_configuration() {
    let h = harness();
    let occurrence = h
        .tracker
        .track(&sample_exception(), TrackContext::default())
        .await
        .unwrap()
        .unwrap();

    let result = h.tracker.create_issue(occurrence.error_group_id).await;

    assert!(matches!(
        result,
        Err(TrackingError::Issue {
            source: IssueError::NotConfigured,
            ..
        })
    ));
}

#[tokio::test]
async fn test_create_issue_for_tracked_group() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/shop/issues"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "html_url": "https://github.com/acme/shop/issues/9",
            "number": 9
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.github.repo = Some("acme/shop".to_string());
    config.github.token = Some("ghp_test".to_string());
    config.github.api_base = mock_server.uri();
    let creator = GithubIssueCreator::new(config.github.clone(), &config.http).unwrap();

    let h = harness_with(config);
    let tracker = h.tracker.with_issue_creator(creator);
    let occurrence = tracker
        .track(&sample_exception(), TrackContext::default())
        .await
        .unwrap()
        .unwrap();

    let issue = tracker.create_issue(occurrence.error_group_id).await.unwrap();

    assert_eq!(issue.number, 9);
    assert_eq!(issue.url, "https://github.com/acme/shop/issues/9");
}
