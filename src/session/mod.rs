//! Browser sessions and the driver that runs them.
//!
//! A session is an ordered run of fallible steps against one leased
//! browser page: `prepare`, `authenticate`, `perform`, `persist`. The
//! driver short-circuits on the first failed step and always produces
//! exactly one [`SessionOutcome`], which it reports through the status
//! sink before handing it back to the worker.
//!
//! The two concrete sessions live in submodules: [`discovery`] crawls
//! search pages for new jobs, [`apply`] submits a stored proposal.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{Credentials, SiteUrls};
use crate::markers::MarkerError;
use crate::page::{BrowserPage, PageError};
use crate::records::RecordError;
use crate::sink::StatusSink;

pub mod apply;
pub mod discovery;

/// Login form username field.
const USERNAME_FIELD: &str = "#login_username";
/// Login form password field.
const PASSWORD_FIELD: &str = "#login_password";
/// Login form security-question answer field.
const SECURITY_ANSWER_FIELD: &str = "#login_answer";
/// Login form remember-me checkbox.
const REMEMBER_ME_CHECKBOX: &str = "#login_rememberme";
/// Sidebar element only rendered for an authenticated account.
const PROFILE_SIDEBAR: &str = r#"section[data-test="freelancer-sidebar-profile"]"#;

/// Failure of a single session step.
#[derive(Debug, Error)]
pub enum StepError {
    /// Browser interaction failed.
    #[error(transparent)]
    Page(#[from] PageError),

    /// Record store interaction failed.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Marker file interaction failed.
    #[error(transparent)]
    Marker(#[from] MarkerError),

    /// The step's own precondition or logic failed.
    #[error("{0}")]
    Failed(String),
}

/// Result of one session step.
pub type StepResult = Result<(), StepError>;

/// Terminal status of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Every step completed.
    Success,
    /// A step failed; later steps did not run.
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The single outcome every session run produces.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    /// Whether the session ran to completion.
    pub status: SessionStatus,
    /// Human-readable summary; on failure, `"{step}: {error}"`.
    pub message: String,
    /// Session-specific result data, such as discovery counters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl SessionOutcome {
    /// Builds a success outcome.
    #[must_use]
    pub fn success(message: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            status: SessionStatus::Success,
            message: message.into(),
            payload,
        }
    }

    /// Builds a failure outcome.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::Failed,
            message: message.into(),
            payload: None,
        }
    }
}

/// One unit of browser work, split into ordered steps.
///
/// Steps run in declaration order and the driver stops at the first
/// failure, so each step may assume everything before it succeeded.
/// Sessions hold their own collaborators; the page is passed in because
/// it is leased from the pool per run.
#[async_trait]
pub trait Session: Send {
    /// Short name used in logs and task errors.
    fn kind(&self) -> &'static str;

    /// Loads whatever the session needs before touching the browser.
    async fn prepare(&mut self) -> StepResult {
        Ok(())
    }

    /// Establishes an authenticated page.
    async fn authenticate(&mut self, page: &mut dyn BrowserPage) -> StepResult;

    /// The session's main work.
    async fn perform(&mut self, page: &mut dyn BrowserPage) -> StepResult;

    /// Writes results after the browser work succeeded.
    async fn persist(&mut self) -> StepResult {
        Ok(())
    }

    /// Summary line for the success outcome.
    fn success_message(&self) -> String;

    /// Result data attached to the success outcome.
    fn outcome_payload(&self) -> Option<Value> {
        None
    }
}

/// Runs a session to its single terminal outcome.
///
/// The outcome is posted to the sink on both paths; delivery failure is
/// logged and does not change the outcome.
#[instrument(skip_all, fields(session = session.kind()))]
pub async fn run_session(
    session: &mut (dyn Session + '_),
    page: &mut dyn BrowserPage,
    sink: &StatusSink,
) -> SessionOutcome {
    let outcome = match drive(session, page).await {
        Ok(()) => {
            let outcome =
                SessionOutcome::success(session.success_message(), session.outcome_payload());
            info!(message = %outcome.message, "session succeeded");
            outcome
        }
        Err((step, e)) => {
            warn!(step, error = %e, "session failed");
            SessionOutcome::failed(format!("{step}: {e}"))
        }
    };

    if !sink.post_status(&outcome).await {
        debug!("session status not delivered");
    }
    outcome
}

async fn drive(
    session: &mut (dyn Session + '_),
    page: &mut dyn BrowserPage,
) -> Result<(), (&'static str, StepError)> {
    session.prepare().await.map_err(|e| ("prepare", e))?;
    session
        .authenticate(page)
        .await
        .map_err(|e| ("authenticate", e))?;
    session.perform(page).await.map_err(|e| ("perform", e))?;
    session.persist().await.map_err(|e| ("persist", e))?;
    Ok(())
}

/// Logs the account in, or confirms an existing login.
///
/// Navigates to the login page; if the form is present it is filled and
/// submitted, and if instead the authenticated sidebar is already
/// rendered the page is considered logged in.
///
/// # Errors
///
/// Returns [`StepError::Failed`] when neither the form nor the sidebar
/// is found, and [`StepError::Page`] on browser failures.
pub(crate) async fn login(
    page: &mut dyn BrowserPage,
    credentials: &Credentials,
    site: &SiteUrls,
) -> StepResult {
    page.goto(&site.login_url).await?;

    if page.has_element(USERNAME_FIELD).await? {
        page.fill(USERNAME_FIELD, &credentials.username).await?;
        page.click(REMEMBER_ME_CHECKBOX).await?;
        page.fill(PASSWORD_FIELD, &credentials.password).await?;
        if let Some(answer) = &credentials.security_answer {
            if page.has_element(SECURITY_ANSWER_FIELD).await? {
                page.fill(SECURITY_ANSWER_FIELD, answer).await?;
            }
        }
        debug!("login form submitted");
        return Ok(());
    }

    if page.has_element(PROFILE_SIDEBAR).await? {
        debug!("already logged in");
        return Ok(());
    }

    Err(StepError::Failed("login page not found".to_string()))
}
