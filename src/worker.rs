//! The worker loop: claim, run, record.
//!
//! One worker drains the task queue. Each claimed task is turned into a
//! session, given a leased browser page, and run inside its own spawned
//! task so a panic is contained and reported as an ordinary failure.
//! The task's terminal status is written back whatever happens; only a
//! shutdown mid-flight leaves a `processing` row, which startup orphan
//! recovery returns to `pending`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::context::AppContext;
use crate::filter::JobFilter;
use crate::queue::{Task, TaskKind, TaskStatus};
use crate::session::apply::{ApplyRequest, ApplySession};
use crate::session::discovery::DiscoverySession;
use crate::session::{run_session, Session, SessionOutcome, SessionStatus};

/// Pause after a failed claim before polling again.
const CLAIM_BACKOFF: Duration = Duration::from_secs(5);

/// Single-consumer queue worker.
pub struct Worker {
    ctx: Arc<AppContext>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    /// Creates a worker over the shared context.
    ///
    /// The worker stops after finishing its current task once `true` is
    /// sent on the shutdown channel (or the sender is dropped).
    #[must_use]
    pub fn new(ctx: Arc<AppContext>, shutdown: watch::Receiver<bool>) -> Self {
        Self { ctx, shutdown }
    }

    /// Runs until shutdown is signalled.
    pub async fn run(mut self) {
        info!(
            poll_interval_ms = self.ctx.config.poll_interval.as_millis(),
            pool_size = self.ctx.pool.size(),
            "worker started"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.ctx.queue.claim_next().await {
                Ok(Some(task)) => self.process(task).await,
                Ok(None) => {
                    if self.wait(self.ctx.config.poll_interval).await {
                        break;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "transient queue error; backing off");
                    if self.wait(CLAIM_BACKOFF).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "claim failed");
                    if self.wait(CLAIM_BACKOFF).await {
                        break;
                    }
                }
            }
        }

        info!("worker stopped");
    }

    /// Sleeps for `duration`, returning `true` when shutdown interrupts
    /// the sleep.
    async fn wait(&mut self, duration: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(duration) => false,
            _ = self.shutdown.changed() => true,
        }
    }

    #[instrument(skip(self, task), fields(task_id = task.id, kind = %task.kind_str))]
    async fn process(&self, task: Task) {
        info!(priority = task.priority, "task claimed");

        let kind = match task.kind() {
            Ok(kind) => kind,
            Err(message) => {
                self.finish(task.id, &SessionOutcome::failed(message)).await;
                return;
            }
        };

        let mut session = match self.build_session(kind, task.payload.as_deref()) {
            Ok(session) => session,
            Err(message) => {
                self.finish(task.id, &SessionOutcome::failed(message)).await;
                return;
            }
        };

        let mut lease = match self.ctx.pool.acquire().await {
            Ok(lease) => lease,
            Err(e) => {
                // Pool only closes at shutdown; the claimed row goes back
                // to pending via orphan recovery on the next start.
                warn!(error = %e, "page pool closed; leaving task for recovery");
                return;
            }
        };

        let sink = self.ctx.sink.clone();
        let handle = tokio::spawn(async move {
            run_session(session.as_mut(), &mut *lease, &sink).await
        });

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "session task aborted");
                SessionOutcome::failed(format!("session panicked: {e}"))
            }
        };

        self.finish(task.id, &outcome).await;
    }

    /// Builds the session for a task kind, or a failure message when the
    /// payload does not support it.
    fn build_session(
        &self,
        kind: TaskKind,
        payload: Option<&str>,
    ) -> Result<Box<dyn Session>, String> {
        let ctx = &self.ctx;
        match kind {
            TaskKind::DiscoverJobs => Ok(Box::new(DiscoverySession::new(
                ctx.config.targets.clone(),
                JobFilter::new(&ctx.config.avoid_words),
                Arc::clone(&ctx.records),
                ctx.markers.clone(),
                ctx.sink.clone(),
                ctx.config.credentials.clone(),
                ctx.config.site.clone(),
            ))),
            TaskKind::ApplyToJob => {
                let raw = payload.ok_or_else(|| "apply task has no payload".to_string())?;
                let request: ApplyRequest = serde_json::from_str(raw)
                    .map_err(|e| format!("malformed apply payload: {e}"))?;
                Ok(Box::new(ApplySession::new(
                    request,
                    Arc::clone(&ctx.records),
                    ctx.config.credentials.clone(),
                    ctx.config.site.clone(),
                )))
            }
        }
    }

    /// Writes the task's terminal status from the session outcome.
    async fn finish(&self, task_id: i64, outcome: &SessionOutcome) {
        let (status, last_error) = match outcome.status {
            SessionStatus::Success => (TaskStatus::Done, None),
            SessionStatus::Failed => (TaskStatus::Failed, Some(outcome.message.as_str())),
        };

        if let Err(e) = self.ctx.queue.update_status(task_id, status, last_error).await {
            error!(task_id, error = %e, "failed to record task outcome");
        } else {
            info!(task_id, status = %status, "task finished");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use async_trait::async_trait;
    use std::path::PathBuf;

    use super::*;
    use crate::config::{Config, Credentials, SiteUrls};
    use crate::db::Database;
    use crate::jobs::JobDetails;
    use crate::page::{BrowserPage, PageError};

    /// Page stub that reports every selector as absent.
    struct BlankPage;

    #[async_trait]
    impl BrowserPage for BlankPage {
        async fn goto(&mut self, _url: &str) -> Result<(), PageError> {
            Ok(())
        }

        async fn has_element(&mut self, _selector: &str) -> Result<bool, PageError> {
            Ok(false)
        }

        async fn fill(&mut self, _selector: &str, _value: &str) -> Result<(), PageError> {
            Ok(())
        }

        async fn click(&mut self, _selector: &str) -> Result<(), PageError> {
            Ok(())
        }

        async fn text_content(&mut self, _selector: &str) -> Result<String, PageError> {
            Ok(String::new())
        }

        async fn recent_job_links(&mut self) -> Result<Vec<String>, PageError> {
            Ok(Vec::new())
        }

        async fn job_details(&mut self, job_url: &str) -> Result<JobDetails, PageError> {
            Err(PageError::Extraction {
                url: job_url.to_string(),
                message: "blank page".to_string(),
            })
        }

        async fn question_labels(&mut self) -> Result<Vec<String>, PageError> {
            Ok(Vec::new())
        }

        async fn fill_question(&mut self, _label: &str, _answer: &str) -> Result<(), PageError> {
            Ok(())
        }
    }

    fn config(marker_path: PathBuf) -> Config {
        Config {
            database_path: PathBuf::from(":memory:"),
            marker_path,
            pool_size: 1,
            poll_interval: Duration::from_millis(10),
            credentials: Credentials {
                username: "sam".to_string(),
                password: "hunter2".to_string(),
                security_answer: None,
            },
            site: SiteUrls {
                login_url: "https://example.com/login".to_string(),
                home_url: "https://example.com/home".to_string(),
            },
            targets: Vec::new(),
            avoid_words: Vec::new(),
            status_endpoint: None,
            payload_endpoint: None,
        }
    }

    async fn context() -> (Arc<AppContext>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new_in_memory().await.unwrap();
        let pages: Vec<Box<dyn BrowserPage>> = vec![Box::new(BlankPage)];
        let ctx = AppContext::new(config(dir.path().join("markers.json")), db, pages);
        (Arc::new(ctx), dir)
    }

    fn worker(ctx: &Arc<AppContext>) -> (Worker, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (Worker::new(Arc::clone(ctx), rx), tx)
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_task() {
        let (ctx, _dir) = context().await;
        let id = ctx.queue.enqueue("mine_bitcoin", None, 0).await.unwrap();
        let task = ctx.queue.claim_next().await.unwrap().unwrap();

        let (worker, _tx) = worker(&ctx);
        worker.process(task).await;

        let task = ctx.queue.get(id).await.unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(
            task.last_error.as_deref(),
            Some("unknown task kind: mine_bitcoin")
        );
    }

    #[tokio::test]
    async fn test_apply_without_payload_fails_task() {
        let (ctx, _dir) = context().await;
        let id = ctx.queue.enqueue("apply_to_job", None, 0).await.unwrap();
        let task = ctx.queue.claim_next().await.unwrap().unwrap();

        let (worker, _tx) = worker(&ctx);
        worker.process(task).await;

        let task = ctx.queue.get(id).await.unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.last_error.as_deref(), Some("apply task has no payload"));
    }

    #[tokio::test]
    async fn test_malformed_apply_payload_fails_task() {
        let (ctx, _dir) = context().await;
        let id = ctx
            .queue
            .enqueue(
                "apply_to_job",
                Some(&serde_json::json!({"job_url": "https://example.com/jobs/1"})),
                0,
            )
            .await
            .unwrap();
        let task = ctx.queue.claim_next().await.unwrap().unwrap();

        let (worker, _tx) = worker(&ctx);
        worker.process(task).await;

        // approved_by is required.
        let task = ctx.queue.get(id).await.unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.last_error.unwrap().starts_with("malformed apply payload"));
    }

    #[tokio::test]
    async fn test_discovery_without_targets_fails_in_prepare() {
        let (ctx, _dir) = context().await;
        let id = ctx.queue.enqueue("discover_jobs", None, 0).await.unwrap();
        let task = ctx.queue.claim_next().await.unwrap().unwrap();

        let (worker, _tx) = worker(&ctx);
        worker.process(task).await;

        let task = ctx.queue.get(id).await.unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(
            task.last_error.as_deref(),
            Some("prepare: no search targets configured")
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (ctx, _dir) = context().await;
        let (worker, tx) = worker(&ctx);

        let handle = tokio::spawn(worker.run());
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop after shutdown")
            .unwrap();
    }
}
