//! # Faultline Errors
//!
//! Error taxonomy shared by every Faultline crate.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields everywhere so log lines stay self-describing
//! - Only [`TrackingError`] is ever surfaced to the code that called the
//!   tracker; every other family is logged and swallowed at its boundary.

use thiserror::Error;

/// Persistence layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection to {backend} failed: {reason}")]
    ConnectionError { backend: String, reason: String },

    #[error("Query on {backend} failed: {reason}")]
    QueryError { backend: String, reason: String },

    #[error("Serialization error: {error_type} - {reason}")]
    SerializationError { error_type: String, reason: String },

    #[error("Not found on {backend}: {id}")]
    NotFound { backend: String, id: String },

    #[error("Transaction on {backend} failed: {reason}")]
    TransactionError { backend: String, reason: String },

    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String }
}

impl StorageError {
    pub fn query(backend: &str, reason: impl ToString) -> Self {
        Self::QueryError {
            backend: backend.to_string(),
            reason: reason.to_string()
        }
    }

    pub fn not_found(backend: &str, id: impl ToString) -> Self {
        Self::NotFound {
            backend: backend.to_string(),
            id: id.to_string()
        }
    }
}

/// Outbound notification channel errors.
///
/// Always soft failures: the dispatcher logs them with the channel name and
/// moves on to the next channel.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("{channel}: request failed: {reason}")]
    Transport { channel: String, reason: String },

    #[error("{channel}: request failed with status {status}: {body}")]
    Rejected {
        channel: String,
        status: u16,
        body: String
    },

    #[error("{channel}: unsupported HTTP method {method}")]
    UnsupportedMethod { channel: String, method: String },

    #[error("{channel}: failed to build payload: {reason}")]
    Payload { channel: String, reason: String }
}

impl NotifierError {
    pub fn channel(&self) -> &str {
        match self {
            Self::Transport { channel, .. }
            | Self::Rejected { channel, .. }
            | Self::UnsupportedMethod { channel, .. }
            | Self::Payload { channel, .. } => channel
        }
    }
}

/// Issue-tracker ticket creation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssueError {
    #[error("GitHub not configured")]
    NotConfigured,

    #[error("GitHub API error: {status} - {body}")]
    ApiRejected { status: u16, body: String },

    #[error("Failed to create issue: {reason}")]
    Transport { reason: String },

    #[error("Failed to create issue: unexpected response: {reason}")]
    InvalidResponse { reason: String }
}

/// Errors surfaced by the tracker.
///
/// This is the only family allowed to reach the caller of `track`: it means
/// the occurrence was not persisted.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Failed to persist error group {fingerprint}: {source}")]
    GroupPersistence {
        fingerprint: String,
        #[source]
        source: StorageError
    },

    #[error("Failed to persist occurrence for group {group_id}: {source}")]
    OccurrencePersistence {
        group_id: String,
        #[source]
        source: StorageError
    },

    #[error("Error group not found: {group_id}")]
    GroupNotFound { group_id: String },

    #[error("Failed to update status of group {group_id}: {source}")]
    StatusUpdate {
        group_id: String,
        #[source]
        source: StorageError
    },

    #[error("Failed to create issue for group {group_id}: {source}")]
    Issue {
        group_id: String,
        #[source]
        source: IssueError
    },

    #[error("Failed to initialize {component}: {reason}")]
    Initialization { component: String, reason: String }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Configuration validation failed: {reason}")]
    Validation { reason: String }
}
