//! Durable task queue backed by `SQLite`.
//!
//! Tasks move through the lifecycle `pending → processing → {done,
//! failed, aborted}`. Claiming is a single atomic `UPDATE ... RETURNING`
//! statement, so concurrent claimants never observe the same row and
//! never wait on one another; this holds even though the current
//! deployment runs a single worker.
//!
//! # Example
//!
//! ```ignore
//! use autobid_core::queue::{TaskQueue, TaskKind, TaskStatus};
//! use autobid_core::Database;
//!
//! let db = Database::new(Path::new("autobid.db")).await?;
//! let queue = TaskQueue::new(db);
//!
//! queue.enqueue(TaskKind::DiscoverJobs.as_str(), None, 0).await?;
//!
//! if let Some(task) = queue.claim_next().await? {
//!     // ... run the matching session ...
//!     queue.update_status(task.id, TaskStatus::Done, None).await?;
//! }
//! ```

mod error;
mod item;

pub use error::{QueueDbErrorKind, QueueError};
pub use item::{Task, TaskKind, TaskStatus};

use crate::db::Database;
use sqlx::Row;
use tracing::{debug, instrument};

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Task queue manager.
///
/// Provides atomic claim-and-lock semantics over the `task_queue` table.
/// Rows are never deleted here; terminal tasks are retained for audit.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    db: Database,
}

impl TaskQueue {
    /// Creates a new queue manager with the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Adds a new task with pending status.
    ///
    /// The kind is stored as opaque text so callers can enqueue kinds
    /// this build does not yet handle; the worker fails such tasks at
    /// claim time instead.
    ///
    /// # Arguments
    ///
    /// * `kind` - Task kind string (e.g. `discover_jobs`, `apply_to_job`)
    /// * `payload` - Optional JSON payload owned by the kind's handler
    /// * `priority` - Higher values are claimed first
    ///
    /// # Returns
    ///
    /// The ID of the newly created task.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the insert fails.
    #[instrument(skip(self, payload), fields(kind = %kind, priority))]
    pub async fn enqueue(
        &self,
        kind: &str,
        payload: Option<&serde_json::Value>,
        priority: i64,
    ) -> Result<i64> {
        let payload_text = payload.map(serde_json::Value::to_string);

        let result = sqlx::query(
            r"INSERT INTO task_queue (task_kind, payload, priority, status)
              VALUES (?, ?, ?, ?)
              RETURNING id",
        )
        .bind(kind)
        .bind(payload_text)
        .bind(priority)
        .bind(TaskStatus::Pending.as_str())
        .fetch_one(self.db.pool())
        .await?;

        Ok(result.get("id"))
    }

    /// Claims the next eligible task for processing.
    ///
    /// Atomically transitions the pending task with the highest priority
    /// (ties broken by earliest creation, then lowest id) to `processing`
    /// and returns it. The claim is one statement, so a row claimed by
    /// another worker is simply skipped rather than waited on. Returns
    /// `None` when no pending tasks exist - an ordinary outcome, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn claim_next(&self) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r"UPDATE task_queue
              SET status = ?, updated_at = datetime('now')
              WHERE id = (
                  SELECT id FROM task_queue
                  WHERE status = ?
                  ORDER BY priority DESC, created_at ASC, id ASC
                  LIMIT 1
              )
              AND status = ?
              RETURNING *",
        )
        .bind(TaskStatus::Processing.as_str())
        .bind(TaskStatus::Pending.as_str())
        .bind(TaskStatus::Pending.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        if let Some(task) = &task {
            debug!(task_id = task.id, kind = %task.kind_str, "claimed task");
        }

        Ok(task)
    }

    /// Moves a claimed task to a terminal status.
    ///
    /// Idempotent: a task already in a terminal status is left untouched
    /// and the call succeeds, so a worker retrying a status update after
    /// a transient failure cannot corrupt history.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidTransition`] if `status` is not
    /// terminal, or if the task is still pending (terminal statuses are
    /// only reachable from `processing`).
    /// Returns [`QueueError::TaskNotFound`] if no task exists with the
    /// given ID.
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self), fields(status = %status))]
    pub async fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(QueueError::InvalidTransition {
                id,
                from: TaskStatus::Processing.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        let result = sqlx::query(
            r"UPDATE task_queue
              SET status = ?, last_error = ?, updated_at = datetime('now')
              WHERE id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(last_error)
        .bind(id)
        .bind(TaskStatus::Processing.as_str())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // No row moved: distinguish missing, already-terminal (no-op
        // success), and a task that was never claimed.
        match self.get(id).await? {
            None => Err(QueueError::TaskNotFound(id)),
            Some(task) if task.status().is_terminal() => {
                debug!(task_id = id, current = %task.status_str, "terminal status already set");
                Ok(())
            }
            Some(task) => Err(QueueError::InvalidTransition {
                id,
                from: task.status_str,
                to: status.as_str().to_string(),
            }),
        }
    }

    /// Resets all `processing` tasks back to `pending`.
    ///
    /// Run exactly once at startup, before the worker loop begins: any
    /// task left mid-flight by a crashed or cancelled run must be
    /// re-claimed rather than silently lost. There is no lease expiry, so
    /// a claimant that hangs without crashing keeps its task until the
    /// next restart.
    ///
    /// # Returns
    ///
    /// The number of tasks that were reset.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn recover_orphans(&self) -> Result<u64> {
        let result = sqlx::query(
            r"UPDATE task_queue
              SET status = ?, updated_at = datetime('now')
              WHERE status = ?",
        )
        .bind(TaskStatus::Pending.as_str())
        .bind(TaskStatus::Processing.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Gets a task by ID.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(r"SELECT * FROM task_queue WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(task)
    }

    /// Counts tasks by status.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_by_status(&self, status: TaskStatus) -> Result<i64> {
        let result = sqlx::query(r"SELECT COUNT(*) as count FROM task_queue WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(self.db.pool())
            .await?;

        Ok(result.get("count"))
    }

    /// Lists tasks filtered by status, in claim order.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            r"SELECT * FROM task_queue
              WHERE status = ?
              ORDER BY priority DESC, created_at ASC, id ASC",
        )
        .bind(status.as_str())
        .fetch_all(self.db.pool())
        .await?;

        Ok(tasks)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    // Full lifecycle coverage lives in tests/queue_integration.rs; these
    // tests pin the status-transition edge cases.

    use super::*;
    use crate::Database;

    async fn queue() -> TaskQueue {
        let db = Database::new_in_memory().await.unwrap();
        TaskQueue::new(db)
    }

    #[tokio::test]
    async fn test_update_status_rejects_non_terminal_target() {
        let queue = queue().await;
        let id = queue.enqueue("discover_jobs", None, 0).await.unwrap();

        let result = queue.update_status(id, TaskStatus::Processing, None).await;
        assert!(matches!(result, Err(QueueError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_update_status_rejects_unclaimed_task() {
        let queue = queue().await;
        let id = queue.enqueue("discover_jobs", None, 0).await.unwrap();

        // Terminal statuses are only reachable from processing.
        let result = queue.update_status(id, TaskStatus::Done, None).await;
        assert!(matches!(result, Err(QueueError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_update_status_missing_task() {
        let queue = queue().await;
        let result = queue.update_status(999, TaskStatus::Failed, None).await;
        assert!(matches!(result, Err(QueueError::TaskNotFound(999))));
    }

    #[tokio::test]
    async fn test_update_status_terminal_is_idempotent() {
        let queue = queue().await;
        let id = queue.enqueue("discover_jobs", None, 0).await.unwrap();
        let task = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(task.id, id);

        queue
            .update_status(id, TaskStatus::Failed, Some("step 2: boom"))
            .await
            .unwrap();

        // Second terminal write is a no-op success and keeps the first
        // diagnostic.
        queue.update_status(id, TaskStatus::Done, None).await.unwrap();

        let task = queue.get(id).await.unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.last_error.as_deref(), Some("step 2: boom"));
    }
}
