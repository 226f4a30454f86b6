//! Record store boundary for discovered jobs and their proposals.
//!
//! The orchestration core does not own the business records; it calls
//! three operations against a [`RecordStore`] collaborator. A uniqueness
//! violation on insert is a first-class *duplicate* outcome - discovery
//! regularly re-sees jobs and "already known" is not a failure.
//!
//! [`SqliteRecordStore`] backs the trait with the `proposals` table in
//! the shared database; each record is a JSON document keyed by job URL,
//! and updates merge fields into the document so later pipeline stages
//! (proposal generation, application attribution) can extend it.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use thiserror::Error;
use tracing::instrument;

use crate::db::Database;

/// Errors from record store operations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Underlying store failed.
    #[error("record store error: {0}")]
    Database(String),

    /// Update targeted a key with no record.
    #[error("no record for key: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for RecordError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result of attempting to add a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The record was new and is now stored.
    Inserted,
    /// A record with this key already exists; nothing was written.
    Duplicate,
}

/// Persistence contract for job/proposal records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stores a new record under a unique key.
    ///
    /// Returns [`AddOutcome::Duplicate`] when the key is already taken;
    /// that is an ordinary outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Database`] if the store is unreachable.
    async fn add_record(&self, key: &str, data: &Value) -> Result<AddOutcome, RecordError>;

    /// Fetches the record stored under a key.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Database`] if the store is unreachable.
    async fn get_record(&self, key: &str) -> Result<Option<Value>, RecordError>;

    /// Merges fields into an existing record's document.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotFound`] if no record exists for the key.
    /// Returns [`RecordError::Database`] if the store is unreachable.
    async fn update_record(&self, key: &str, fields: &Value) -> Result<(), RecordError>;
}

/// [`RecordStore`] over the `proposals` table.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    db: Database,
}

impl SqliteRecordStore {
    /// Creates a store over the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self, data), fields(key = %key))]
    async fn add_record(&self, key: &str, data: &Value) -> Result<AddOutcome, RecordError> {
        let result = sqlx::query(r"INSERT INTO proposals (job_url, data) VALUES (?, ?)")
            .bind(key)
            .bind(data.to_string())
            .execute(self.db.pool())
            .await;

        match result {
            Ok(_) => Ok(AddOutcome::Inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(AddOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get_record(&self, key: &str) -> Result<Option<Value>, RecordError> {
        let row = sqlx::query(r"SELECT data FROM proposals WHERE job_url = ?")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.get("data");
        let data = serde_json::from_str(&raw)
            .map_err(|e| RecordError::Database(format!("corrupt record for {key}: {e}")))?;
        Ok(Some(data))
    }

    #[instrument(skip(self, fields), fields(key = %key))]
    async fn update_record(&self, key: &str, fields: &Value) -> Result<(), RecordError> {
        let result = sqlx::query(
            r"UPDATE proposals
              SET data = json_patch(data, ?), updated_at = datetime('now')
              WHERE job_url = ?",
        )
        .bind(fields.to_string())
        .bind(key)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound(key.to_string()));
        }
        Ok(())
    }
}
