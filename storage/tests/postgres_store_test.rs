//! Integration tests for the PostgreSQL error store.
//!
//! These tests use the shared testcontainers fixture and are skipped when
//! Docker is not available.

use chrono::{Duration, Utc};
use fl_core::traits::ErrorStore;
use fl_core::types::{ErrorStatus, NewErrorContext};
use std::sync::Arc;
use storage::PostgresErrorStore;
use testing::{sample_new_group, sample_new_occurrence, unique_id};

async fn store() -> Option<PostgresErrorStore> {
    let Some(fixture) = testing::postgres().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return None;
    };
    let store = PostgresErrorStore::new(fixture.url()).await.ok()?;
    store.initialize_schema().await.ok()?;
    Some(store)
}

#[tokio::test]
async fn test_postgres_find_or_create_group() {
    let Some(store) = store().await else { return };
    let fingerprint = unique_id("pg-fp");

    let created = store
        .find_or_create_group(&sample_new_group(&fingerprint))
        .await
        .unwrap();
    let again = store
        .find_or_create_group(&sample_new_group(&fingerprint))
        .await
        .unwrap();

    assert_eq!(created.id, again.id);
    assert_eq!(created.occurrences_count, 0);
    assert_eq!(created.status, ErrorStatus::Unresolved);
}

#[tokio::test]
async fn test_postgres_concurrent_first_occurrences() {
    let Some(store) = store().await else { return };
    let store = Arc::new(store);
    let fingerprint = unique_id("pg-race");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        let new_group = sample_new_group(&fingerprint);
        handles.push(tokio::spawn(async move {
            let group = store.find_or_create_group(&new_group).await.unwrap();
            store
                .record_occurrence(group.id, sample_new_occurrence(), Vec::new(), Utc::now())
                .await
                .unwrap()
                .group
                .id
        }));
    }

    let ids: std::collections::HashSet<_> = futures_util::future::join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(ids.len(), 1);

    let group = store
        .find_group_by_fingerprint(&fingerprint)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.occurrences_count, 16);
}

#[tokio::test]
async fn test_postgres_record_reopens_resolved_group() {
    let Some(store) = store().await else { return };
    let group = store
        .find_or_create_group(&sample_new_group(&unique_id("pg-reopen")))
        .await
        .unwrap();
    store
        .update_status(group.id, ErrorStatus::Resolved, Utc::now() - Duration::hours(1))
        .await
        .unwrap();

    let recorded = store
        .record_occurrence(
            group.id,
            sample_new_occurrence(),
            vec![NewErrorContext::new("severity", Some("error".to_string())).unwrap()],
            Utc::now()
        )
        .await
        .unwrap();

    assert!(recorded.reopened);
    assert_eq!(recorded.group.status, ErrorStatus::Unresolved);
    assert!(recorded.group.resolved_at.is_none());
    assert!(recorded.group.reopened_at.is_some());
    assert_eq!(recorded.contexts.len(), 1);
    assert_eq!(recorded.occurrence.backtrace, sample_new_occurrence().backtrace);
}

#[tokio::test]
async fn test_postgres_delete_group_cascades() {
    let Some(store) = store().await else { return };
    let group = store
        .find_or_create_group(&sample_new_group(&unique_id("pg-delete")))
        .await
        .unwrap();
    let recorded = store
        .record_occurrence(
            group.id,
            sample_new_occurrence(),
            vec![NewErrorContext::new("k", Some("v".to_string())).unwrap()],
            Utc::now()
        )
        .await
        .unwrap();

    assert!(store.delete_group(group.id).await.unwrap());
    assert!(store.list_occurrences(group.id, 10).await.unwrap().is_empty());
    assert!(store.list_contexts(recorded.occurrence.id).await.unwrap().is_empty());
}
