//! Shared test support: a scripted browser page.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use autobid_core::{BrowserPage, JobDetails, PageError};

/// Selector the marketplace renders only for an authenticated account.
pub const LOGGED_IN_MARKER: &str = r#"section[data-test="freelancer-sidebar-profile"]"#;

/// Scripted [`BrowserPage`]: canned answers, recorded interactions.
#[derive(Default)]
pub struct ScriptedPage {
    /// Selectors that report as present.
    pub elements: HashSet<String>,
    /// Links returned for the search page, newest first.
    pub job_links: Vec<String>,
    /// Job details by URL; missing URLs fail extraction.
    pub details: HashMap<String, JobDetails>,
    /// Labels of bid-form questions.
    pub question_labels: Vec<String>,
    /// Every interaction, in order.
    pub actions: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPage {
    /// A page that already carries an authenticated browser session.
    pub fn logged_in() -> Self {
        let mut page = Self::default();
        page.elements.insert(LOGGED_IN_MARKER.to_string());
        page
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        self.record(format!("goto {url}"));
        Ok(())
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool, PageError> {
        Ok(self.elements.contains(selector))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        self.record(format!("fill {selector}={value}"));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), PageError> {
        self.record(format!("click {selector}"));
        Ok(())
    }

    async fn text_content(&mut self, _selector: &str) -> Result<String, PageError> {
        Ok(String::new())
    }

    async fn recent_job_links(&mut self) -> Result<Vec<String>, PageError> {
        Ok(self.job_links.clone())
    }

    async fn job_details(&mut self, job_url: &str) -> Result<JobDetails, PageError> {
        self.record(format!("details {job_url}"));
        self.details
            .get(job_url)
            .cloned()
            .ok_or_else(|| PageError::Extraction {
                url: job_url.to_string(),
                message: "no details scripted".to_string(),
            })
    }

    async fn question_labels(&mut self) -> Result<Vec<String>, PageError> {
        Ok(self.question_labels.clone())
    }

    async fn fill_question(&mut self, label: &str, answer: &str) -> Result<(), PageError> {
        self.record(format!("answer {label}={answer}"));
        Ok(())
    }
}

/// A job that clears every filter rule.
pub fn biddable_job(job_url: &str) -> JobDetails {
    JobDetails {
        job_url: job_url.to_string(),
        title: "React frontend".to_string(),
        summary: "react app with typed api".to_string(),
        total_spent: "100000".to_string(),
        payment_verified: true,
        qualified: true,
        duration_type: "duration2".to_string(),
        job_type: "Hourly".to_string(),
        hourly_rate: "$25".to_string(),
        hire_rate: "80%".to_string(),
        ..JobDetails::default()
    }
}
