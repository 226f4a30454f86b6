//! Apply session: submit a stored proposal for one job.
//!
//! The proposal must already exist on the job's record under the
//! `proposal` field; a missing record or proposal fails the session in
//! `prepare`, before a page is ever touched. After the bid form is
//! submitted the record is marked applied with the approver's name.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use async_trait::async_trait;

use crate::config::{Credentials, SiteUrls};
use crate::jobs::{normalize_question, Proposal};
use crate::page::BrowserPage;
use crate::records::RecordStore;

use super::{login, Session, StepError, StepResult};

/// Button on the job page that opens the bid form.
const OPEN_BID_FORM: &str = r#"button[data-cy="submit-proposal-button"]"#;
/// Cover letter textarea on the bid form.
const COVER_LETTER_FIELD: &str = r#"textarea[aria-labelledby="cover_letter_label"]"#;
/// Final submit button on the bid form.
const SUBMIT_BID: &str = r#"button[data-qa="submit-application"]"#;

/// Task payload for an apply task.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyRequest {
    /// Job to apply to; the record key.
    pub job_url: String,
    /// Who reviewed and approved the proposal.
    pub approved_by: String,
}

/// Session that submits one stored proposal.
pub struct ApplySession {
    request: ApplyRequest,
    records: Arc<dyn RecordStore>,
    credentials: Credentials,
    site: SiteUrls,
    proposal: Option<Proposal>,
}

impl ApplySession {
    /// Creates an apply session for the given request.
    #[must_use]
    pub fn new(
        request: ApplyRequest,
        records: Arc<dyn RecordStore>,
        credentials: Credentials,
        site: SiteUrls,
    ) -> Self {
        Self {
            request,
            records,
            credentials,
            site,
            proposal: None,
        }
    }

    fn proposal(&self) -> Result<&Proposal, StepError> {
        self.proposal
            .as_ref()
            .ok_or_else(|| StepError::Failed("proposal not loaded".to_string()))
    }

    async fn answer_questions(&self, page: &mut dyn BrowserPage) -> StepResult {
        let answers = self.proposal()?.answers_by_question();
        if answers.is_empty() {
            return Ok(());
        }

        for label in page.question_labels().await? {
            let Some(answer) = answers.get(&normalize_question(&label)) else {
                return Err(StepError::Failed(format!(
                    "no generated answer for question: {label}"
                )));
            };
            page.fill_question(&label, answer).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Session for ApplySession {
    fn kind(&self) -> &'static str {
        "apply_to_job"
    }

    async fn prepare(&mut self) -> StepResult {
        let record = self
            .records
            .get_record(&self.request.job_url)
            .await?
            .ok_or_else(|| {
                StepError::Failed(format!("no record for job: {}", self.request.job_url))
            })?;

        let proposal = record.get("proposal").ok_or_else(|| {
            StepError::Failed(format!(
                "no proposal generated for job: {}",
                self.request.job_url
            ))
        })?;
        self.proposal = Some(
            serde_json::from_value(proposal.clone())
                .map_err(|e| StepError::Failed(format!("malformed proposal: {e}")))?,
        );
        debug!(job_url = %self.request.job_url, "proposal loaded");
        Ok(())
    }

    async fn authenticate(&mut self, page: &mut dyn BrowserPage) -> StepResult {
        login(page, &self.credentials, &self.site).await
    }

    async fn perform(&mut self, page: &mut dyn BrowserPage) -> StepResult {
        page.goto(&self.request.job_url).await?;
        page.click(OPEN_BID_FORM).await?;
        page.fill(COVER_LETTER_FIELD, &self.proposal()?.cover_letter)
            .await?;
        self.answer_questions(page).await?;
        page.click(SUBMIT_BID).await?;
        info!(job_url = %self.request.job_url, "proposal submitted");
        Ok(())
    }

    async fn persist(&mut self) -> StepResult {
        self.records
            .update_record(
                &self.request.job_url,
                &json!({"applied": true, "approved_by": self.request.approved_by}),
            )
            .await?;
        Ok(())
    }

    fn success_message(&self) -> String {
        format!("applied to {}", self.request.job_url)
    }
}
