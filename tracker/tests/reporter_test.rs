use config::Config;
use fl_core::exception::ExceptionInfo;
use fl_core::traits::ErrorStore;
use notifiers::NotifierDispatch;
use serde_json::json;
use std::sync::Arc;
use storage::InMemoryErrorStore;
use tracker::{ErrorReporter, ReportOptions, Severity, Tracker};

#[derive(Debug, thiserror::Error)]
#[error("ledger {ledger_id} is out of balance")]
struct LedgerImbalance {
    ledger_id: u32
}

fl_core::impl_reportable!(LedgerImbalance);

fn reporter_with(config: Config) -> (Arc<InMemoryErrorStore>, ErrorReporter) {
    let store = Arc::new(InMemoryErrorStore::new());
    let tracker = Tracker::new(store.clone(), &config, NotifierDispatch::default());
    (store, ErrorReporter::new(Arc::new(tracker)))
}

#[tokio::test]
async fn test_report_stores_metadata_as_context() {
    let (store, reporter) = reporter_with(Config::default());
    let error = LedgerImbalance { ledger_id: 12 };

    let occurrence = reporter
        .report(
            &error,
            ReportOptions::default()
                .with_severity(Severity::Warning)
                .with_source("billing.reconcile")
                .with_context(json!({"batch": 7}))
        )
        .await
        .unwrap()
        .unwrap();

    let group = store.groups().pop().unwrap();
    assert!(group.exception_class.ends_with("LedgerImbalance"));
    assert_eq!(group.sanitized_message, "ledger N is out of balance");

    let contexts = store.list_contexts(occurrence.id).await.unwrap();
    let value = |key: &str| {
        contexts
            .iter()
            .find(|c| c.key == key)
            .and_then(|c| c.parsed_value())
    };
    assert_eq!(value("handled"), Some(json!(true)));
    assert_eq!(value("severity"), Some(json!("warning")));
    assert_eq!(value("source"), Some(json!("billing.reconcile")));
    assert_eq!(value("custom_data"), Some(json!({"batch": 7})));
}

#[tokio::test]
async fn test_report_skips_ignored_class() {
    let mut config = Config::default();
    config.tracking.ignored_exceptions = vec!["billing::Skipped".to_string()];
    let (store, reporter) = reporter_with(config);

    let result = reporter
        .report(
            &ExceptionInfo::new("billing::Skipped", "nothing to do"),
            ReportOptions::default()
        )
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(store.group_count(), 0);
}
