//! Discovery session: crawl search targets for new job postings.
//!
//! Each target's result page is walked newest-first and the walk stops
//! at the link that was seen first on the previous run. Candidates are
//! screened by the policy filter, recorded (duplicates are counted, not
//! errors), and accepted jobs are posted to the payload sink. Markers
//! only advance in `persist`, after the browser work succeeded.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use async_trait::async_trait;

use crate::config::{Credentials, SearchTarget, SiteUrls};
use crate::filter::JobFilter;
use crate::markers::{MarkerMap, MarkerStore};
use crate::page::BrowserPage;
use crate::records::{AddOutcome, RecordStore};
use crate::sink::StatusSink;

use super::{login, Session, StepError, StepResult};

/// Bounds for the random pause between job-page visits, milliseconds.
const PACING_MS: std::ops::Range<u64> = 800..2_400;

/// What one discovery run did, attached to the outcome payload.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DiscoveryCounters {
    /// New links walked across all targets.
    pub seen: u64,
    /// Jobs that passed the filter and were recorded.
    pub accepted: u64,
    /// Jobs the filter declined.
    pub rejected: u64,
    /// Jobs already present in the record store.
    pub duplicates: u64,
}

/// Session that crawls the configured search targets.
pub struct DiscoverySession {
    targets: Vec<SearchTarget>,
    filter: JobFilter,
    records: Arc<dyn RecordStore>,
    markers: MarkerStore,
    sink: StatusSink,
    credentials: Credentials,
    site: SiteUrls,
    last_seen: MarkerMap,
    next_markers: MarkerMap,
    counters: DiscoveryCounters,
}

impl DiscoverySession {
    /// Creates a discovery session over the given collaborators.
    #[must_use]
    pub fn new(
        targets: Vec<SearchTarget>,
        filter: JobFilter,
        records: Arc<dyn RecordStore>,
        markers: MarkerStore,
        sink: StatusSink,
        credentials: Credentials,
        site: SiteUrls,
    ) -> Self {
        Self {
            targets,
            filter,
            records,
            markers,
            sink,
            credentials,
            site,
            last_seen: MarkerMap::new(),
            next_markers: MarkerMap::new(),
            counters: DiscoveryCounters::default(),
        }
    }

    async fn crawl_target(
        &mut self,
        page: &mut dyn BrowserPage,
        target: &SearchTarget,
    ) -> StepResult {
        page.goto(&target.url).await?;
        let links = page.recent_job_links().await?;

        // The newest link on the page becomes the next run's marker,
        // whether or not anything below it is worth recording.
        if let Some(newest) = links.first() {
            self.next_markers.insert(target.name.clone(), newest.clone());
        }

        let fresh = fresh_links(&links, self.last_seen.get(&target.name));
        info!(
            search_target = %target.name,
            fresh = fresh.len(),
            listed = links.len(),
            "crawling search target"
        );

        for link in fresh {
            self.counters.seen += 1;
            self.visit_candidate(page, link).await?;
            tokio::time::sleep(page_pause()).await;
        }
        Ok(())
    }

    async fn visit_candidate(&mut self, page: &mut dyn BrowserPage, link: &str) -> StepResult {
        // A single unreadable posting should not sink the whole run.
        let details = match page.job_details(link).await {
            Ok(details) => details,
            Err(e) => {
                warn!(job_url = %link, error = %e, "skipping unreadable job posting");
                return Ok(());
            }
        };

        if !self.filter.is_allowed(&details) {
            self.counters.rejected += 1;
            debug!(job_url = %link, "job declined by filter");
            return Ok(());
        }

        let data = serde_json::to_value(&details)
            .map_err(|e| StepError::Failed(format!("unencodable job details: {e}")))?;
        match self.records.add_record(link, &data).await? {
            AddOutcome::Duplicate => {
                self.counters.duplicates += 1;
                debug!(job_url = %link, "job already recorded");
            }
            AddOutcome::Inserted => {
                self.counters.accepted += 1;
                info!(job_url = %link, title = %details.title, "job accepted");
                self.sink.post_payload(&data).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Session for DiscoverySession {
    fn kind(&self) -> &'static str {
        "discover_jobs"
    }

    async fn prepare(&mut self) -> StepResult {
        if self.targets.is_empty() {
            return Err(StepError::Failed("no search targets configured".to_string()));
        }
        self.last_seen = self.markers.load()?;
        Ok(())
    }

    async fn authenticate(&mut self, page: &mut dyn BrowserPage) -> StepResult {
        login(page, &self.credentials, &self.site).await
    }

    async fn perform(&mut self, page: &mut dyn BrowserPage) -> StepResult {
        let targets = self.targets.clone();
        for target in &targets {
            self.crawl_target(page, target).await?;
        }
        Ok(())
    }

    async fn persist(&mut self) -> StepResult {
        // Targets with no listings this run keep their previous marker.
        let mut merged = self.last_seen.clone();
        merged.extend(self.next_markers.clone());
        self.markers.save(&merged)?;
        Ok(())
    }

    fn success_message(&self) -> String {
        format!(
            "discovery finished: {} seen, {} accepted, {} rejected, {} duplicates",
            self.counters.seen,
            self.counters.accepted,
            self.counters.rejected,
            self.counters.duplicates
        )
    }

    fn outcome_payload(&self) -> Option<Value> {
        serde_json::to_value(&self.counters).ok()
    }
}

/// Links newer than the previous run's marker, newest first.
fn fresh_links<'a>(links: &'a [String], last_seen: Option<&String>) -> &'a [String] {
    match last_seen {
        Some(marker) => match links.iter().position(|link| link == marker) {
            Some(index) => &links[..index],
            None => links,
        },
        None => links,
    }
}

/// Polite jitter between job-page visits.
fn page_pause() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(PACING_MS))
}
