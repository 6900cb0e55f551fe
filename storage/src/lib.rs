//! # Storage Layer
//!
//! [`ErrorStore`] implementations for Faultline.
//!
//! - [`postgres::PostgresErrorStore`]: PostgreSQL via `sqlx`, group
//!   uniqueness backed by a unique constraint
//! - [`memory::InMemoryErrorStore`]: in-process, every operation under one
//!   lock

pub mod memory;
pub mod postgres;

use config::StorageConfig;
use errors::StorageError;
use fl_core::traits::ErrorStore;
use std::sync::Arc;

pub use memory::InMemoryErrorStore;
pub use postgres::{PostgresError, PostgresErrorStore};

/// Build the configured store. The PostgreSQL schema is created if missing.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn ErrorStore>, StorageError> {
    match config.backend.as_str() {
        "postgres" => {
            let store = PostgresErrorStore::from_config(config).await?;
            store.initialize_schema().await?;
            tracing::info!(backend = "postgres", "Error store ready");
            Ok(Arc::new(store))
        }
        "memory" => {
            tracing::info!(backend = "memory", "Error store ready");
            Ok(Arc::new(InMemoryErrorStore::new()))
        }
        other => Err(StorageError::ConnectionError {
            backend: other.to_string(),
            reason: "unknown storage backend".to_string()
        })
    }
}
