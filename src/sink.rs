//! Best-effort delivery of session outcomes to external endpoints.
//!
//! Sessions report their terminal status, and discovery posts each
//! accepted job, to configured webhook endpoints. Delivery is strictly
//! fire-and-forget: an unset endpoint or a failed POST is logged and
//! never retried, and never changes a task's completion status.

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::session::SessionOutcome;

/// HTTP sink for terminal statuses and accepted-job payloads.
#[derive(Debug, Clone)]
pub struct StatusSink {
    client: reqwest::Client,
    status_endpoint: Option<String>,
    payload_endpoint: Option<String>,
}

impl StatusSink {
    /// Creates a sink; either endpoint may be unset, in which case the
    /// corresponding posts are skipped.
    #[must_use]
    pub fn new(status_endpoint: Option<String>, payload_endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            status_endpoint,
            payload_endpoint,
        }
    }

    /// Posts a session's terminal status.
    ///
    /// Returns whether delivery succeeded; callers may only log the
    /// answer, never fail on it.
    #[instrument(skip(self, outcome), fields(status = %outcome.status))]
    pub async fn post_status(&self, outcome: &SessionOutcome) -> bool {
        let Some(endpoint) = &self.status_endpoint else {
            debug!("no status endpoint configured; skipping status post");
            return false;
        };
        self.post(endpoint, &serde_json::json!(outcome)).await
    }

    /// Posts one accepted-job payload.
    #[instrument(skip(self, payload))]
    pub async fn post_payload(&self, payload: &Value) -> bool {
        let Some(endpoint) = &self.payload_endpoint else {
            debug!("no payload endpoint configured; skipping payload post");
            return false;
        };
        self.post(endpoint, payload).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> bool {
        match self.client.post(endpoint).json(body).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(endpoint = %endpoint, status = %response.status(), "sink rejected post");
                false
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "sink delivery failed");
                false
            }
        }
    }
}
