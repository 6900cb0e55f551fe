//! In-process [`ErrorStore`] for tests, development and single-process hosts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::StorageError;
use fl_core::traits::ErrorStore;
use fl_core::types::{
    ErrorContext, ErrorGroup, ErrorOccurrence, ErrorStatus, NewErrorContext, NewErrorGroup,
    NewErrorOccurrence, RecordedOccurrence
};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

const BACKEND: &str = "memory";

#[derive(Debug, Default)]
struct MemoryState {
    groups: HashMap<Uuid, ErrorGroup>,
    by_fingerprint: HashMap<String, Uuid>,
    occurrences: HashMap<Uuid, ErrorOccurrence>,
    /// Occurrence ids per group in insertion order.
    group_occurrences: HashMap<Uuid, Vec<Uuid>>,
    contexts: HashMap<Uuid, Vec<ErrorContext>>
}

/// Every operation runs under one lock, which gives the same atomicity the
/// PostgreSQL store gets from its unique constraint and transaction.
#[derive(Debug, Default)]
pub struct InMemoryErrorStore {
    state: RwLock<MemoryState>
}

impl InMemoryErrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_count(&self) -> usize {
        self.state.read().groups.len()
    }

    pub fn occurrence_count(&self) -> usize {
        self.state.read().occurrences.len()
    }

    pub fn groups(&self) -> Vec<ErrorGroup> {
        self.state.read().groups.values().cloned().collect()
    }
}

#[async_trait]
impl ErrorStore for InMemoryErrorStore {
    async fn find_or_create_group(&self, group: &NewErrorGroup) -> Result<ErrorGroup, StorageError> {
        let mut state = self.state.write();
        if let Some(id) = state.by_fingerprint.get(&group.fingerprint).copied() {
            return state
                .groups
                .get(&id)
                .cloned()
                .ok_or_else(|| StorageError::not_found(BACKEND, id));
        }

        let created = group.clone().into_group(utils::generate_uuid());
        state
            .by_fingerprint
            .insert(created.fingerprint.clone(), created.id);
        state.groups.insert(created.id, created.clone());
        Ok(created)
    }

    async fn record_occurrence(
        &self,
        group_id: Uuid,
        occurrence: NewErrorOccurrence,
        contexts: Vec<NewErrorContext>,
        seen_at: DateTime<Utc>
    ) -> Result<RecordedOccurrence, StorageError> {
        let mut state = self.state.write();

        let group = state
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| StorageError::not_found(BACKEND, group_id))?;

        let reopened = group.status == ErrorStatus::Resolved;
        group.occurrences_count += 1;
        group.last_seen_at = group.last_seen_at.max(seen_at);
        if reopened {
            group.status = ErrorStatus::Unresolved;
            group.resolved_at = None;
            group.reopened_at = Some(seen_at);
        }
        let group = group.clone();

        let occurrence = occurrence.into_occurrence(utils::generate_uuid(), group_id, seen_at);
        let stored_contexts: Vec<ErrorContext> = contexts
            .into_iter()
            .map(|c| c.into_context(utils::generate_uuid(), occurrence.id, seen_at))
            .collect();

        state
            .group_occurrences
            .entry(group_id)
            .or_default()
            .push(occurrence.id);
        state.occurrences.insert(occurrence.id, occurrence.clone());
        state.contexts.insert(occurrence.id, stored_contexts.clone());

        Ok(RecordedOccurrence {
            group,
            occurrence,
            contexts: stored_contexts,
            reopened
        })
    }

    async fn get_group(&self, group_id: Uuid) -> Result<Option<ErrorGroup>, StorageError> {
        Ok(self.state.read().groups.get(&group_id).cloned())
    }

    async fn find_group_by_fingerprint(
        &self,
        fingerprint: &str
    ) -> Result<Option<ErrorGroup>, StorageError> {
        let state = self.state.read();
        Ok(state
            .by_fingerprint
            .get(fingerprint)
            .and_then(|id| state.groups.get(id))
            .cloned())
    }

    async fn update_status(
        &self,
        group_id: Uuid,
        status: ErrorStatus,
        at: DateTime<Utc>
    ) -> Result<ErrorGroup, StorageError> {
        let mut state = self.state.write();
        let group = state
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| StorageError::not_found(BACKEND, group_id))?;
        group.status = status;
        group.resolved_at = (status == ErrorStatus::Resolved).then_some(at);
        Ok(group.clone())
    }

    async fn list_occurrences(
        &self,
        group_id: Uuid,
        limit: usize
    ) -> Result<Vec<ErrorOccurrence>, StorageError> {
        let state = self.state.read();
        let Some(ids) = state.group_occurrences.get(&group_id) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .rev()
            .filter_map(|id| state.occurrences.get(id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_contexts(&self, occurrence_id: Uuid) -> Result<Vec<ErrorContext>, StorageError> {
        Ok(self
            .state
            .read()
            .contexts
            .get(&occurrence_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<bool, StorageError> {
        let mut state = self.state.write();
        let Some(group) = state.groups.remove(&group_id) else {
            return Ok(false);
        };
        state.by_fingerprint.remove(&group.fingerprint);
        for occurrence_id in state.group_occurrences.remove(&group_id).unwrap_or_default() {
            state.occurrences.remove(&occurrence_id);
            state.contexts.remove(&occurrence_id);
        }
        Ok(true)
    }
}
