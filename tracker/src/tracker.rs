//! # Tracker
//!
//! Orchestrates one failure end to end: ignore rules, fingerprinting,
//! persistence, callbacks and notification dispatch.
//!
//! Only persistence failures reach the caller, as [`TrackingError`].
//! Callback and channel failures are logged and swallowed.

use crate::ignore::IgnorePolicy;
use chrono::{Duration, Utc};
use config::{Config, TrackingConfig};
use errors::{StorageError, TrackingError};
use fl_core::capture::{CapturePolicy, CaptureScope};
use fl_core::exception::ExceptionInfo;
use fl_core::fingerprint::GroupKey;
use fl_core::serializer::VariableSerializer;
use fl_core::traits::ErrorStore;
use fl_core::types::{
    ErrorGroup, ErrorOccurrence, ErrorStatus, NewErrorContext, NewErrorOccurrence, TrackContext
};
use notifiers::{CreatedIssue, DispatchReport, ErrorEvent, GithubIssueCreator, NotifierDispatch};
use observability::{IgnoreReason, Telemetry, TrackTimer};
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use uuid::Uuid;

/// Decides whether a failure is tracked. Returning `false` skips it.
pub type BeforeTrack = Arc<dyn Fn(&ExceptionInfo, &TrackContext) -> bool + Send + Sync>;

/// Runs after an occurrence is persisted.
pub type AfterTrack = Arc<dyn Fn(&ErrorOccurrence) -> anyhow::Result<()> + Send + Sync>;

pub struct Tracker {
    store: Arc<dyn ErrorStore>,
    dispatch: NotifierDispatch,
    serializer: VariableSerializer,
    capture_policy: Arc<CapturePolicy>,
    ignore: IgnorePolicy,
    config: TrackingConfig,
    hostname: String,
    before_track: Option<BeforeTrack>,
    after_track: Option<AfterTrack>,
    issue_creator: Option<GithubIssueCreator>
}

impl Tracker {
    pub fn new(store: Arc<dyn ErrorStore>, config: &Config, dispatch: NotifierDispatch) -> Self {
        Self {
            store,
            dispatch,
            serializer: VariableSerializer::new(&config.serializer),
            capture_policy: Arc::new(CapturePolicy::from(&config.capture)),
            ignore: IgnorePolicy::new(&config.tracking),
            config: config.tracking.clone(),
            hostname: utils::hostname(),
            before_track: None,
            after_track: None,
            issue_creator: None
        }
    }

    pub fn with_before_track<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ExceptionInfo, &TrackContext) -> bool + Send + Sync + 'static
    {
        self.before_track = Some(Arc::new(callback));
        self
    }

    pub fn with_after_track<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ErrorOccurrence) -> anyhow::Result<()> + Send + Sync + 'static
    {
        self.after_track = Some(Arc::new(callback));
        self
    }

    pub fn with_issue_creator(mut self, creator: GithubIssueCreator) -> Self {
        self.issue_creator = Some(creator);
        self
    }

    pub fn store(&self) -> &Arc<dyn ErrorStore> {
        &self.store
    }

    pub fn dispatch(&self) -> &NotifierDispatch {
        &self.dispatch
    }

    pub fn ignore_policy(&self) -> &IgnorePolicy {
        &self.ignore
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Fresh capture scope for one unit of work. Disarmed when tracking or
    /// capture is switched off.
    pub fn new_scope(&self) -> CaptureScope {
        if self.config.enabled {
            CaptureScope::armed(self.capture_policy.clone())
        } else {
            CaptureScope::disarmed(self.capture_policy.clone())
        }
    }

    fn reopen_window(&self) -> Duration {
        i64::try_from(self.config.reopen_window_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Persist one failure.
    ///
    /// Returns `Ok(None)` when the failure is ignored, and the stored
    /// occurrence otherwise.
    pub async fn track(
        &self,
        exception: &ExceptionInfo,
        context: TrackContext
    ) -> Result<Option<ErrorOccurrence>, TrackingError> {
        if !self.config.enabled {
            Telemetry::record_ignored(IgnoreReason::Disabled);
            return Ok(None);
        }
        if self.ignore.ignores_exception(&exception.class) {
            tracing::debug!(exception_class = %exception.class, "Ignoring configured exception class");
            Telemetry::record_ignored(IgnoreReason::ExceptionClass);
            return Ok(None);
        }
        if !self.run_before_track(exception, &context) {
            Telemetry::record_ignored(IgnoreReason::BeforeTrack);
            return Ok(None);
        }

        let timer = TrackTimer::start();
        let now = Utc::now();
        let key = GroupKey::from_exception(exception, context.captured.as_ref(), &self.capture_policy);

        let group = self
            .store
            .find_or_create_group(&key.to_new_group(now))
            .await
            .map_err(|source| {
                Telemetry::record_tracking_failure();
                TrackingError::GroupPersistence {
                    fingerprint: key.fingerprint.clone(),
                    source
                }
            })?;

        let occurrence = self.build_occurrence(exception, &context);
        let contexts = self.build_contexts(&context);
        let recorded = self
            .store
            .record_occurrence(group.id, occurrence, contexts, now)
            .await
            .map_err(|source| {
                Telemetry::record_tracking_failure();
                TrackingError::OccurrencePersistence {
                    group_id: group.id.to_string(),
                    source
                }
            })?;

        Telemetry::record_occurrence(&exception.class);
        tracing::info!(
            group_id = %recorded.group.id,
            fingerprint = %recorded.group.fingerprint,
            exception_class = %exception.class,
            occurrences = recorded.group.occurrences_count,
            reopened = recorded.reopened,
            "Error tracked"
        );

        self.run_after_track(&recorded.occurrence);

        if recorded.group.status != ErrorStatus::Ignored {
            let event = ErrorEvent {
                recently_reopened: recorded.group.recently_reopened(now, self.reopen_window()),
                reopened: recorded.reopened,
                group: recorded.group,
                occurrence: recorded.occurrence.clone(),
                app_name: self.config.app_name.clone(),
                environment: self.config.environment.clone(),
                dashboard_url: self.config.dashboard_url.clone()
            };
            self.notify(&event).await;
        }

        timer.finish();
        Ok(Some(recorded.occurrence))
    }

    async fn notify(&self, event: &ErrorEvent) -> DispatchReport {
        if self.dispatch.is_empty() {
            return DispatchReport::default();
        }
        let report = self.dispatch.dispatch(event).await;
        if report.failed() > 0 {
            tracing::warn!(
                group_id = %event.group.id,
                failed = report.failed(),
                delivered = report.delivered(),
                "Some notification channels failed"
            );
        }
        report
    }

    fn run_before_track(&self, exception: &ExceptionInfo, context: &TrackContext) -> bool {
        let Some(callback) = &self.before_track else {
            return true;
        };
        match catch_unwind(AssertUnwindSafe(|| callback(exception, context))) {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(exception_class = %exception.class, "before_track callback panicked, skipping");
                false
            }
        }
    }

    fn run_after_track(&self, occurrence: &ErrorOccurrence) {
        let Some(callback) = &self.after_track else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(|| callback(occurrence))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(occurrence_id = %occurrence.id, error = %e, "after_track callback failed");
            }
            Err(_) => {
                tracing::warn!(occurrence_id = %occurrence.id, "after_track callback panicked");
            }
        }
    }

    fn build_occurrence(&self, exception: &ExceptionInfo, context: &TrackContext) -> NewErrorOccurrence {
        let local_variables = context
            .captured
            .as_ref()
            .map(|frame| self.serializer.serialize(&frame.locals_variable()))
            .filter(|locals| !locals.is_empty());
        let request = context.request.as_ref();
        let user = context.user.as_ref();

        NewErrorOccurrence {
            exception_class: exception.class.clone(),
            message: exception.message.clone(),
            backtrace: exception.backtrace.clone(),
            environment: self.config.environment.clone(),
            hostname: self.hostname.clone(),
            process_id: i64::from(std::process::id()),
            request_method: request.map(|r| r.method.clone()),
            request_url: request.map(|r| r.url.clone()),
            ip_address: request.and_then(|r| r.ip_address.clone()),
            user_id: user.map(|u| u.id.clone()),
            user_type: user.and_then(|u| u.user_type.clone()),
            user_identifier: user.and_then(|u| u.identifier.clone()),
            local_variables
        }
    }

    fn build_contexts(&self, context: &TrackContext) -> Vec<NewErrorContext> {
        let mut entries = Vec::new();

        if let Some(data) = &context.custom_data {
            let redacted = Value::Object(self.serializer.serialize_json(data));
            entries.push(NewErrorContext::json("custom_data", &redacted));
        }
        if let Some(user_agent) = context.request.as_ref().and_then(|r| r.user_agent.clone()) {
            entries.push(NewErrorContext::new("user_agent", Some(user_agent)));
        }
        for (key, value) in &context.tags {
            entries.push(NewErrorContext::json(key.as_str(), value));
        }

        entries
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping invalid context entry");
                    None
                }
            })
            .collect()
    }

    pub async fn resolve(&self, group_id: Uuid) -> Result<ErrorGroup, TrackingError> {
        self.set_status(group_id, ErrorStatus::Resolved).await
    }

    pub async fn unresolve(&self, group_id: Uuid) -> Result<ErrorGroup, TrackingError> {
        self.set_status(group_id, ErrorStatus::Unresolved).await
    }

    pub async fn ignore(&self, group_id: Uuid) -> Result<ErrorGroup, TrackingError> {
        self.set_status(group_id, ErrorStatus::Ignored).await
    }

    async fn set_status(&self, group_id: Uuid, status: ErrorStatus) -> Result<ErrorGroup, TrackingError> {
        let group = self
            .store
            .update_status(group_id, status, Utc::now())
            .await
            .map_err(|source| match source {
                StorageError::NotFound { .. } => TrackingError::GroupNotFound {
                    group_id: group_id.to_string()
                },
                source => TrackingError::StatusUpdate {
                    group_id: group_id.to_string(),
                    source
                }
            })?;
        tracing::info!(group_id = %group_id, status = %status, "Error group status changed");
        Ok(group)
    }

    /// Open a GitHub issue for a group, using its latest occurrence for the
    /// stack trace and locals.
    pub async fn create_issue(&self, group_id: Uuid) -> Result<CreatedIssue, TrackingError> {
        let lookup_error = |source| TrackingError::StatusUpdate {
            group_id: group_id.to_string(),
            source
        };
        let group = self
            .store
            .get_group(group_id)
            .await
            .map_err(lookup_error)?
            .ok_or_else(|| TrackingError::GroupNotFound {
                group_id: group_id.to_string()
            })?;
        let latest = self
            .store
            .list_occurrences(group_id, 1)
            .await
            .map_err(lookup_error)?
            .into_iter()
            .next();

        let issue_error = |source| TrackingError::Issue {
            group_id: group_id.to_string(),
            source
        };
        let creator = self
            .issue_creator
            .as_ref()
            .ok_or_else(|| issue_error(errors::IssueError::NotConfigured))?;
        creator
            .create(&group, latest.as_ref())
            .await
            .map_err(issue_error)
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("dispatch", &self.dispatch)
            .field("hostname", &self.hostname)
            .finish()
    }
}
