//! Task types and status definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Status of a queued task.
///
/// Statuses only move forward: `pending → processing → {done, failed,
/// aborted}`. The single backward edge, `processing → pending`, is the
/// startup orphan-recovery transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Claimed by a worker and currently running.
    Processing,
    /// Finished successfully.
    Done,
    /// Finished with a failure; see `last_error`.
    Failed,
    /// Cancelled externally before completion.
    Aborted,
}

impl TaskStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }

    /// Returns true for statuses a task can never leave.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("invalid task status: {s}")),
        }
    }
}

/// The kind of work a task represents.
///
/// The queue itself stores the kind as opaque text; only the worker
/// interprets it, so an unknown kind is an enqueue-time non-issue and a
/// claim-time failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Crawl the configured search targets for newly posted jobs.
    DiscoverJobs,
    /// Submit a previously generated proposal for one job.
    ApplyToJob,
}

impl TaskKind {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscoverJobs => "discover_jobs",
            Self::ApplyToJob => "apply_to_job",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discover_jobs" => Ok(Self::DiscoverJobs),
            "apply_to_job" => Ok(Self::ApplyToJob),
            _ => Err(format!("unknown task kind: {s}")),
        }
    }
}

/// A single persisted unit of deferred work.
#[derive(Debug, Clone, FromRow)]
pub struct Task {
    /// Unique identifier, monotonically assigned.
    pub id: i64,
    /// Task kind as stored (parsed via `kind()`).
    #[sqlx(rename = "task_kind")]
    pub kind_str: String,
    /// Opaque JSON payload; interpretation belongs to the kind's handler.
    pub payload: Option<String>,
    /// Higher priority tasks are claimed first (default 0).
    pub priority: i64,
    /// Current lifecycle status (stored as text, parsed via `status()`).
    #[sqlx(rename = "status")]
    pub status_str: String,
    /// Diagnostic message from the last failure, if any.
    pub last_error: Option<String>,
    /// When the task was enqueued.
    pub created_at: String,
    /// When the task last changed status.
    pub updated_at: String,
}

impl Task {
    /// Returns the parsed task kind, or an error for kinds this build
    /// does not understand.
    ///
    /// # Errors
    ///
    /// Returns the unrecognized kind string.
    pub fn kind(&self) -> Result<TaskKind, String> {
        self.kind_str.parse()
    }

    /// Returns the parsed status enum.
    ///
    /// Falls back to `Pending` if the stored string is invalid.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status_str.parse().unwrap_or(TaskStatus::Pending)
    }

    /// Parses the payload as JSON.
    ///
    /// Returns `None` when the payload is absent or not valid JSON.
    #[must_use]
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        self.payload
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task {{ id: {}, kind: {}, status: {} }}",
            self.id,
            self.kind_str,
            self.status()
        )
    }
}
