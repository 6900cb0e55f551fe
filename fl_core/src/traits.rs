//! Persistence contract for error groups, occurrences and contexts.

use crate::types::{
    ErrorContext, ErrorGroup, ErrorOccurrence, ErrorStatus, NewErrorContext, NewErrorGroup,
    NewErrorOccurrence, RecordedOccurrence
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::StorageError;
use uuid::Uuid;

/// Storage backend for tracked errors.
///
/// Implementations must make [`ErrorStore::find_or_create_group`] atomic per
/// fingerprint and apply the counter increment of
/// [`ErrorStore::record_occurrence`] at the storage layer, never as a
/// read-modify-write in the caller.
#[async_trait]
pub trait ErrorStore: Send + Sync {
    /// Return the group for `group.fingerprint`, creating it with a zero
    /// occurrence count when absent. Concurrent callers with the same
    /// fingerprint all receive the same row.
    async fn find_or_create_group(&self, group: &NewErrorGroup) -> Result<ErrorGroup, StorageError>;

    /// Increment the group's counter, bump `last_seen_at`, reopen it when it
    /// was resolved, then persist the occurrence and its contexts. All of it
    /// happens in one unit of work.
    async fn record_occurrence(
        &self,
        group_id: Uuid,
        occurrence: NewErrorOccurrence,
        contexts: Vec<NewErrorContext>,
        seen_at: DateTime<Utc>
    ) -> Result<RecordedOccurrence, StorageError>;

    async fn get_group(&self, group_id: Uuid) -> Result<Option<ErrorGroup>, StorageError>;

    async fn find_group_by_fingerprint(
        &self,
        fingerprint: &str
    ) -> Result<Option<ErrorGroup>, StorageError>;

    /// Set the triage status. `resolved_at` is stamped when moving to
    /// resolved and cleared otherwise.
    async fn update_status(
        &self,
        group_id: Uuid,
        status: ErrorStatus,
        at: DateTime<Utc>
    ) -> Result<ErrorGroup, StorageError>;

    /// Most recent first.
    async fn list_occurrences(
        &self,
        group_id: Uuid,
        limit: usize
    ) -> Result<Vec<ErrorOccurrence>, StorageError>;

    async fn list_contexts(&self, occurrence_id: Uuid) -> Result<Vec<ErrorContext>, StorageError>;

    /// Delete the group together with its occurrences and their contexts.
    /// Returns false when the group did not exist.
    async fn delete_group(&self, group_id: Uuid) -> Result<bool, StorageError>;
}
