use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::StorageConfig;
use errors::StorageError;
use fl_core::traits::ErrorStore;
use fl_core::types::{
    ErrorContext, ErrorGroup, ErrorOccurrence, ErrorStatus, NewErrorContext, NewErrorGroup,
    NewErrorOccurrence, RecordedOccurrence
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const BACKEND: &str = "postgres";

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Error group not found: {0}")]
    NotFound(Uuid)
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Database(sqlx::Error::PoolTimedOut) => StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                reason: "pool timed out".to_string()
            },
            PostgresError::Database(e) => StorageError::query(BACKEND, e),
            PostgresError::Serialization(e) => StorageError::SerializationError {
                error_type: "json".to_string(),
                reason: e.to_string()
            },
            PostgresError::NotFound(id) => StorageError::not_found(BACKEND, id)
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct GroupRow {
    id: Uuid,
    fingerprint: String,
    exception_class: String,
    sanitized_message: String,
    file_path: Option<String>,
    line_number: Option<i32>,
    method_name: Option<String>,
    status: String,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    reopened_at: Option<DateTime<Utc>>,
    occurrences_count: i64
}

impl From<GroupRow> for ErrorGroup {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id,
            fingerprint: row.fingerprint,
            exception_class: row.exception_class,
            sanitized_message: row.sanitized_message,
            file_path: row.file_path,
            line_number: row.line_number,
            method_name: row.method_name,
            status: row.status.parse().unwrap_or_default(),
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
            resolved_at: row.resolved_at,
            reopened_at: row.reopened_at,
            occurrences_count: row.occurrences_count
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct OccurrenceRow {
    id: Uuid,
    error_group_id: Uuid,
    exception_class: String,
    message: String,
    backtrace: Value,
    environment: String,
    hostname: String,
    process_id: i64,
    request_method: Option<String>,
    request_url: Option<String>,
    ip_address: Option<String>,
    user_id: Option<String>,
    user_type: Option<String>,
    user_identifier: Option<String>,
    local_variables: Option<Value>,
    created_at: DateTime<Utc>
}

impl From<OccurrenceRow> for ErrorOccurrence {
    fn from(row: OccurrenceRow) -> Self {
        Self {
            id: row.id,
            error_group_id: row.error_group_id,
            exception_class: row.exception_class,
            message: row.message,
            backtrace: serde_json::from_value(row.backtrace).unwrap_or_default(),
            environment: row.environment,
            hostname: row.hostname,
            process_id: row.process_id,
            request_method: row.request_method,
            request_url: row.request_url,
            ip_address: row.ip_address,
            user_id: row.user_id,
            user_type: row.user_type,
            user_identifier: row.user_identifier,
            local_variables: row.local_variables.and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None
            }),
            created_at: row.created_at
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct ContextRow {
    id: Uuid,
    error_occurrence_id: Uuid,
    key: String,
    value: Option<String>,
    created_at: DateTime<Utc>
}

impl From<ContextRow> for ErrorContext {
    fn from(row: ContextRow) -> Self {
        Self {
            id: row.id,
            error_occurrence_id: row.error_occurrence_id,
            key: row.key,
            value: row.value,
            created_at: row.created_at
        }
    }
}

/// PostgreSQL-backed [`ErrorStore`].
///
/// Group uniqueness is enforced by the `fingerprint` unique constraint; the
/// occurrence counter is incremented by a single `UPDATE` inside the same
/// transaction as the occurrence insert.
pub struct PostgresErrorStore {
    pool: PgPool
}

impl PostgresErrorStore {
    pub async fn new(connection_url: &str) -> Result<Self, PostgresError> {
        let pool = PgPool::connect(connection_url).await?;
        Ok(Self { pool })
    }

    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                reason: "database_url is not configured".to_string()
            })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.timeout_seconds))
            .connect(url)
            .await
            .map_err(|e| StorageError::ConnectionError {
                backend: BACKEND.to_string(),
                reason: e.to_string()
            })?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes. Safe to call concurrently.
    pub async fn initialize_schema(&self) -> Result<(), PostgresError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(7465636172)")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS faultline_error_groups (
                id UUID PRIMARY KEY,
                fingerprint TEXT NOT NULL UNIQUE,
                exception_class TEXT NOT NULL,
                sanitized_message TEXT NOT NULL,
                file_path TEXT,
                line_number INTEGER,
                method_name TEXT,
                status TEXT NOT NULL DEFAULT 'unresolved',
                first_seen_at TIMESTAMPTZ NOT NULL,
                last_seen_at TIMESTAMPTZ NOT NULL,
                resolved_at TIMESTAMPTZ,
                reopened_at TIMESTAMPTZ,
                occurrences_count BIGINT NOT NULL DEFAULT 0
            )"
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_faultline_error_groups_status_last_seen \
             ON faultline_error_groups(status, last_seen_at DESC)"
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS faultline_error_occurrences (
                id UUID PRIMARY KEY,
                error_group_id UUID NOT NULL REFERENCES faultline_error_groups(id) ON DELETE CASCADE,
                exception_class TEXT NOT NULL,
                message TEXT NOT NULL,
                backtrace JSONB NOT NULL DEFAULT '[]',
                environment TEXT NOT NULL,
                hostname TEXT NOT NULL,
                process_id BIGINT NOT NULL,
                request_method TEXT,
                request_url TEXT,
                ip_address TEXT,
                user_id TEXT,
                user_type TEXT,
                user_identifier TEXT,
                local_variables JSONB,
                created_at TIMESTAMPTZ NOT NULL
            )"
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_faultline_error_occurrences_group_created \
             ON faultline_error_occurrences(error_group_id, created_at DESC)"
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS faultline_error_contexts (
                id UUID PRIMARY KEY,
                error_occurrence_id UUID NOT NULL \
                    REFERENCES faultline_error_occurrences(id) ON DELETE CASCADE,
                key TEXT NOT NULL CHECK (key <> ''),
                value TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )"
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_faultline_error_contexts_occurrence \
             ON faultline_error_contexts(error_occurrence_id)"
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_or_fetch_group(&self, group: &NewErrorGroup) -> Result<ErrorGroup, PostgresError> {
        let inserted: Option<GroupRow> = sqlx::query_as(
            "INSERT INTO faultline_error_groups (id, fingerprint, exception_class, \
             sanitized_message, file_path, line_number, method_name, status, first_seen_at, \
             last_seen_at, occurrences_count)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'unresolved', $8, $8, 0)
             ON CONFLICT (fingerprint) DO NOTHING
             RETURNING *"
        )
        .bind(Uuid::new_v4())
        .bind(&group.fingerprint)
        .bind(&group.exception_class)
        .bind(&group.sanitized_message)
        .bind(&group.file_path)
        .bind(group.line_number)
        .bind(&group.method_name)
        .bind(group.seen_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            tracing::debug!(fingerprint = %group.fingerprint, "Created error group");
            return Ok(row.into());
        }

        let existing: GroupRow =
            sqlx::query_as("SELECT * FROM faultline_error_groups WHERE fingerprint = $1")
                .bind(&group.fingerprint)
                .fetch_one(&self.pool)
                .await?;
        Ok(existing.into())
    }

    async fn insert_occurrence(
        &self,
        group_id: Uuid,
        occurrence: NewErrorOccurrence,
        contexts: Vec<NewErrorContext>,
        seen_at: DateTime<Utc>
    ) -> Result<RecordedOccurrence, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let prior: Option<(String,)> =
            sqlx::query_as("SELECT status FROM faultline_error_groups WHERE id = $1 FOR UPDATE")
                .bind(group_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((prior_status,)) = prior else {
            return Err(PostgresError::NotFound(group_id));
        };
        let reopened = prior_status == ErrorStatus::Resolved.to_string();

        let group: GroupRow = sqlx::query_as(
            "UPDATE faultline_error_groups
             SET occurrences_count = occurrences_count + 1,
                 last_seen_at = GREATEST(last_seen_at, $2),
                 status = CASE WHEN status = 'resolved' THEN 'unresolved' ELSE status END,
                 resolved_at = CASE WHEN status = 'resolved' THEN NULL ELSE resolved_at END,
                 reopened_at = CASE WHEN status = 'resolved' THEN $2 ELSE reopened_at END
             WHERE id = $1
             RETURNING *"
        )
        .bind(group_id)
        .bind(seen_at)
        .fetch_one(&mut *tx)
        .await?;

        let backtrace = serde_json::to_value(&occurrence.backtrace)?;
        let local_variables = occurrence.local_variables.map(Value::Object);
        let occurrence_row: OccurrenceRow = sqlx::query_as(
            "INSERT INTO faultline_error_occurrences (id, error_group_id, exception_class, \
             message, backtrace, environment, hostname, process_id, request_method, request_url, \
             ip_address, user_id, user_type, user_identifier, local_variables, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING *"
        )
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(&occurrence.exception_class)
        .bind(&occurrence.message)
        .bind(backtrace)
        .bind(&occurrence.environment)
        .bind(&occurrence.hostname)
        .bind(occurrence.process_id)
        .bind(&occurrence.request_method)
        .bind(&occurrence.request_url)
        .bind(&occurrence.ip_address)
        .bind(&occurrence.user_id)
        .bind(&occurrence.user_type)
        .bind(&occurrence.user_identifier)
        .bind(local_variables)
        .bind(seen_at)
        .fetch_one(&mut *tx)
        .await?;

        let mut stored_contexts = Vec::with_capacity(contexts.len());
        for context in contexts {
            let row: ContextRow = sqlx::query_as(
                "INSERT INTO faultline_error_contexts (id, error_occurrence_id, key, value, created_at)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING *"
            )
            .bind(Uuid::new_v4())
            .bind(occurrence_row.id)
            .bind(&context.key)
            .bind(&context.value)
            .bind(seen_at)
            .fetch_one(&mut *tx)
            .await?;
            stored_contexts.push(row.into());
        }

        tx.commit().await?;

        Ok(RecordedOccurrence {
            group: group.into(),
            occurrence: occurrence_row.into(),
            contexts: stored_contexts,
            reopened
        })
    }
}

#[async_trait]
impl ErrorStore for PostgresErrorStore {
    async fn find_or_create_group(&self, group: &NewErrorGroup) -> Result<ErrorGroup, StorageError> {
        Ok(self.insert_or_fetch_group(group).await?)
    }

    async fn record_occurrence(
        &self,
        group_id: Uuid,
        occurrence: NewErrorOccurrence,
        contexts: Vec<NewErrorContext>,
        seen_at: DateTime<Utc>
    ) -> Result<RecordedOccurrence, StorageError> {
        Ok(self
            .insert_occurrence(group_id, occurrence, contexts, seen_at)
            .await?)
    }

    async fn get_group(&self, group_id: Uuid) -> Result<Option<ErrorGroup>, StorageError> {
        let row: Option<GroupRow> =
            sqlx::query_as("SELECT * FROM faultline_error_groups WHERE id = $1")
                .bind(group_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(PostgresError::from)?;
        Ok(row.map(Into::into))
    }

    async fn find_group_by_fingerprint(
        &self,
        fingerprint: &str
    ) -> Result<Option<ErrorGroup>, StorageError> {
        let row: Option<GroupRow> =
            sqlx::query_as("SELECT * FROM faultline_error_groups WHERE fingerprint = $1")
                .bind(fingerprint)
                .fetch_optional(&self.pool)
                .await
                .map_err(PostgresError::from)?;
        Ok(row.map(Into::into))
    }

    async fn update_status(
        &self,
        group_id: Uuid,
        status: ErrorStatus,
        at: DateTime<Utc>
    ) -> Result<ErrorGroup, StorageError> {
        let resolved_at = (status == ErrorStatus::Resolved).then_some(at);
        let row: Option<GroupRow> = sqlx::query_as(
            "UPDATE faultline_error_groups
             SET status = $2, resolved_at = $3
             WHERE id = $1
             RETURNING *"
        )
        .bind(group_id)
        .bind(status.to_string())
        .bind(resolved_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        row.map(Into::into)
            .ok_or_else(|| StorageError::not_found(BACKEND, group_id))
    }

    async fn list_occurrences(
        &self,
        group_id: Uuid,
        limit: usize
    ) -> Result<Vec<ErrorOccurrence>, StorageError> {
        let rows: Vec<OccurrenceRow> = sqlx::query_as(
            "SELECT * FROM faultline_error_occurrences
             WHERE error_group_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        )
        .bind(group_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_contexts(&self, occurrence_id: Uuid) -> Result<Vec<ErrorContext>, StorageError> {
        let rows: Vec<ContextRow> = sqlx::query_as(
            "SELECT * FROM faultline_error_contexts
             WHERE error_occurrence_id = $1
             ORDER BY created_at, key"
        )
        .bind(occurrence_id)
        .fetch_all(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM faultline_error_groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
