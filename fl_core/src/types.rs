use crate::capture::{CapturePolicy, CapturedFrame};
use chrono::{DateTime, Duration, Utc};
use errors::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Triage state of an error group.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorStatus {
    #[default]
    Unresolved,
    Resolved,
    Ignored
}

/// One deduplicated fault, keyed by its fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorGroup {
    pub id: Uuid,
    pub fingerprint: String,
    pub exception_class: String,
    pub sanitized_message: String,
    pub file_path: Option<String>,
    pub line_number: Option<i32>,
    pub method_name: Option<String>,
    pub status: ErrorStatus,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub reopened_at: Option<DateTime<Utc>>,
    pub occurrences_count: i64
}

impl ErrorGroup {
    /// True while the group is unresolved and its last reopen happened within
    /// `window` of `now`.
    pub fn recently_reopened(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.status == ErrorStatus::Unresolved
            && self
                .reopened_at
                .is_some_and(|at| at <= now && now - at <= window)
    }

    pub fn is_first_occurrence(&self) -> bool {
        self.occurrences_count == 1
    }

    /// `file:line`, `file`, or `None` when the group has no location.
    pub fn location(&self) -> Option<String> {
        match (&self.file_path, self.line_number) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            (Some(file), None) => Some(file.clone()),
            _ => None
        }
    }
}

/// Insert payload for [`crate::ErrorStore::find_or_create_group`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewErrorGroup {
    pub fingerprint: String,
    pub exception_class: String,
    pub sanitized_message: String,
    pub file_path: Option<String>,
    pub line_number: Option<i32>,
    pub method_name: Option<String>,
    pub seen_at: DateTime<Utc>
}

impl NewErrorGroup {
    /// Materialize the row a store creates for a fingerprint it has not seen.
    pub fn into_group(self, id: Uuid) -> ErrorGroup {
        ErrorGroup {
            id,
            fingerprint: self.fingerprint,
            exception_class: self.exception_class,
            sanitized_message: self.sanitized_message,
            file_path: self.file_path,
            line_number: self.line_number,
            method_name: self.method_name,
            status: ErrorStatus::Unresolved,
            first_seen_at: self.seen_at,
            last_seen_at: self.seen_at,
            resolved_at: None,
            reopened_at: None,
            occurrences_count: 0
        }
    }
}

/// One captured instance of a fault. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorOccurrence {
    pub id: Uuid,
    pub error_group_id: Uuid,
    pub exception_class: String,
    pub message: String,
    pub backtrace: Vec<String>,
    pub environment: String,
    pub hostname: String,
    pub process_id: i64,
    pub request_method: Option<String>,
    pub request_url: Option<String>,
    pub ip_address: Option<String>,
    pub user_id: Option<String>,
    pub user_type: Option<String>,
    pub user_identifier: Option<String>,
    pub local_variables: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>
}

impl ErrorOccurrence {
    /// Backtrace frames that point into application code.
    pub fn app_backtrace_lines(&self, policy: &CapturePolicy) -> Vec<&str> {
        self.backtrace
            .iter()
            .map(String::as_str)
            .filter(|frame| {
                crate::exception::parse_frame(frame)
                    .is_some_and(|(path, _, _)| policy.is_app_path(path))
            })
            .collect()
    }

    pub fn parsed_local_variables(&self) -> Map<String, Value> {
        self.local_variables.clone().unwrap_or_default()
    }
}

/// Everything about an occurrence except the identifiers the store assigns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewErrorOccurrence {
    pub exception_class: String,
    pub message: String,
    pub backtrace: Vec<String>,
    pub environment: String,
    pub hostname: String,
    pub process_id: i64,
    pub request_method: Option<String>,
    pub request_url: Option<String>,
    pub ip_address: Option<String>,
    pub user_id: Option<String>,
    pub user_type: Option<String>,
    pub user_identifier: Option<String>,
    pub local_variables: Option<Map<String, Value>>
}

impl NewErrorOccurrence {
    pub fn into_occurrence(
        self,
        id: Uuid,
        error_group_id: Uuid,
        created_at: DateTime<Utc>
    ) -> ErrorOccurrence {
        ErrorOccurrence {
            id,
            error_group_id,
            exception_class: self.exception_class,
            message: self.message,
            backtrace: self.backtrace,
            environment: self.environment,
            hostname: self.hostname,
            process_id: self.process_id,
            request_method: self.request_method,
            request_url: self.request_url,
            ip_address: self.ip_address,
            user_id: self.user_id,
            user_type: self.user_type,
            user_identifier: self.user_identifier,
            local_variables: self.local_variables,
            created_at
        }
    }
}

/// Key/value annotation attached to one occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub id: Uuid,
    pub error_occurrence_id: Uuid,
    pub key: String,
    pub value: Option<String>,
    pub created_at: DateTime<Utc>
}

impl ErrorContext {
    /// Decoded JSON when `value` holds JSON, the raw string otherwise.
    pub fn parsed_value(&self) -> Option<Value> {
        let raw = self.value.as_deref()?;
        Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewErrorContext {
    pub key: String,
    pub value: Option<String>
}

impl NewErrorContext {
    /// Rejects empty keys.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Result<Self, StorageError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(StorageError::InvalidRecord {
                reason: "error context key must not be empty".to_string()
            });
        }
        Ok(Self { key, value })
    }

    /// Stores `value` JSON-encoded; strings are stored verbatim.
    pub fn json(key: impl Into<String>, value: &Value) -> Result<Self, StorageError> {
        let encoded = match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string())
        };
        Self::new(key, encoded)
    }

    pub fn into_context(
        self,
        id: Uuid,
        error_occurrence_id: Uuid,
        created_at: DateTime<Utc>
    ) -> ErrorContext {
        ErrorContext {
            id,
            error_occurrence_id,
            key: self.key,
            value: self.value,
            created_at
        }
    }
}

/// Result of [`crate::ErrorStore::record_occurrence`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOccurrence {
    /// Group state after the increment.
    pub group: ErrorGroup,
    pub occurrence: ErrorOccurrence,
    pub contexts: Vec<ErrorContext>,
    /// The occurrence moved the group from resolved back to unresolved.
    pub reopened: bool
}

/// Snapshot of the inbound request taken before the handler runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub path: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub headers: Vec<(String, String)>
}

impl RequestInfo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Identity of the user the failing request acted for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub user_type: Option<String>,
    /// Human-readable label (email, handle) shown in notifications.
    pub identifier: Option<String>
}

/// Everything the tracker knows about the circumstances of a failure.
#[derive(Debug, Clone, Default)]
pub struct TrackContext {
    pub request: Option<RequestInfo>,
    pub user: Option<UserInfo>,
    pub custom_data: Option<Value>,
    pub captured: Option<CapturedFrame>,
    /// Extra annotations stored as context entries (severity, handled, source).
    pub tags: Vec<(String, Value)>
}

impl TrackContext {
    pub fn with_request(mut self, request: RequestInfo) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_custom_data(mut self, data: Value) -> Self {
        self.custom_data = Some(data);
        self
    }

    pub fn with_captured(mut self, frame: Option<CapturedFrame>) -> Self {
        self.captured = frame;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }
}
