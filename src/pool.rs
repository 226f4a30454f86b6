//! Bounded pool of reusable browser pages.
//!
//! Opening a tab against the target site is expensive (full browser
//! navigation, challenge solving), so a fixed set of pages is created at
//! startup and recycled. Acquisition is first-come-first-served and
//! suspends when every page is leased; releasing navigates the page back
//! to the neutral home URL so the next session sees no residual state.
//!
//! Release happens on every exit path: [`PageLease`] returns its page to
//! the pool on drop, including when the holder errors or panics.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::page::BrowserPage;

/// Errors from pool acquisition.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool's semaphore was closed; only possible during shutdown.
    #[error("page pool {0} is closed")]
    Closed(String),
}

struct PoolInner {
    name: String,
    home_url: String,
    size: usize,
    idle: Mutex<VecDeque<Box<dyn BrowserPage>>>,
    semaphore: Semaphore,
}

impl PoolInner {
    /// Resets a page to the neutral home URL and returns it to the idle
    /// set. A failed reset is logged; the page still rejoins the pool so
    /// capacity is never silently lost.
    async fn restore(&self, mut page: Box<dyn BrowserPage>) {
        if let Err(e) = page.goto(&self.home_url).await {
            warn!(pool = %self.name, error = %e, "failed to reset page to home");
        }
        self.push_idle(page);
    }

    fn push_idle(&self, page: Box<dyn BrowserPage>) {
        {
            let mut idle = self.idle.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            // A push past capacity means a page was returned that this
            // pool never handed out; that is a caller bug, not a
            // recoverable condition.
            assert!(
                idle.len() < self.size,
                "page returned to pool {} that it does not own",
                self.name
            );
            idle.push_back(page);
        }
        self.semaphore.add_permits(1);
    }
}

/// Fixed-size pool of [`BrowserPage`] handles.
///
/// Cheap to clone; all clones share the same underlying set of pages.
#[derive(Clone)]
pub struct PagePool {
    inner: Arc<PoolInner>,
}

impl PagePool {
    /// Creates a pool owning the given pages.
    ///
    /// The pool never grows or shrinks after construction; `home_url` is
    /// where pages are parked between leases.
    #[must_use]
    pub fn new(pages: Vec<Box<dyn BrowserPage>>, name: &str, home_url: &str) -> Self {
        let size = pages.len();
        Self {
            inner: Arc::new(PoolInner {
                name: name.to_string(),
                home_url: home_url.to_string(),
                size,
                idle: Mutex::new(pages.into()),
                semaphore: Semaphore::new(size),
            }),
        }
    }

    /// Acquires a page, suspending until one is available.
    ///
    /// Waiters are served in arrival order. The returned lease gives
    /// exclusive mutable access to one page and returns it to the pool
    /// when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] if the pool is shutting down.
    #[instrument(skip(self), fields(pool = %self.inner.name))]
    pub async fn acquire(&self) -> Result<PageLease, PoolError> {
        let permit = self
            .inner
            .semaphore
            .acquire()
            .await
            .map_err(|_| PoolError::Closed(self.inner.name.clone()))?;
        // The permit's slot is handed to the lease; it is restored by
        // push_idle once the page is back.
        permit.forget();

        let page = {
            let mut idle = self
                .inner
                .idle
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match idle.pop_front() {
                Some(page) => page,
                None => unreachable!("pool invariant violated: permit without idle page"),
            }
        };

        debug!(pool = %self.inner.name, idle = self.idle_count(), "page acquired");

        Ok(PageLease {
            page: Some(page),
            inner: Arc::clone(&self.inner),
        })
    }

    /// Total number of pages this pool owns.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Number of pages currently available for lease.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.semaphore.available_permits()
    }
}

/// Exclusive lease on one pooled page.
///
/// Dereferences to `dyn BrowserPage`. On drop the page is reset to the
/// pool's home URL and returned; when no runtime is available the reset
/// is skipped but the page still rejoins the pool.
pub struct PageLease {
    page: Option<Box<dyn BrowserPage>>,
    inner: Arc<PoolInner>,
}

impl Deref for PageLease {
    type Target = dyn BrowserPage;

    fn deref(&self) -> &Self::Target {
        match &self.page {
            Some(page) => page.as_ref(),
            None => unreachable!("lease used after release"),
        }
    }
}

impl DerefMut for PageLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.page {
            Some(page) => page.as_mut(),
            None => unreachable!("lease used after release"),
        }
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                inner.restore(page).await;
            });
        } else {
            // No runtime to run the async reset on; return the page
            // unreset rather than leak pool capacity.
            inner.push_idle(page);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::jobs::JobDetails;
    use crate::page::PageError;

    /// Page stub that records every navigation.
    struct RecordingPage {
        id: usize,
        visits: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl BrowserPage for RecordingPage {
        async fn goto(&mut self, url: &str) -> Result<(), PageError> {
            self.visits.lock().unwrap().push(format!("{}:{url}", self.id));
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

        async fn job_details(&mut self, _job_url: &str) -> Result<JobDetails, PageError> {
            Ok(JobDetails::default())
        }

        async fn question_labels(&mut self) -> Result<Vec<String>, PageError> {
            Ok(Vec::new())
        }

        async fn fill_question(&mut self, _label: &str, _answer: &str) -> Result<(), PageError> {
            Ok(())
        }
    }

    fn recording_pool(count: usize) -> (PagePool, Arc<Mutex<Vec<String>>>) {
        let visits = Arc::new(Mutex::new(Vec::new()));
        let pages: Vec<Box<dyn BrowserPage>> = (0..count)
            .map(|id| {
                Box::new(RecordingPage {
                    id,
                    visits: Arc::clone(&visits),
                }) as Box<dyn BrowserPage>
            })
            .collect();
        (PagePool::new(pages, "test", "https://example.com/home"), visits)
    }

    #[tokio::test]
    async fn test_pool_size_and_idle_count() {
        let (pool, _visits) = recording_pool(3);
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.idle_count(), 3);

        let lease = pool.acquire().await.unwrap();
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.idle_count(), 2);
        drop(lease);
    }

    #[tokio::test]
    async fn test_release_resets_page_to_home() {
        let (pool, visits) = recording_pool(1);

        let mut lease = pool.acquire().await.unwrap();
        lease.goto("https://example.com/jobs").await.unwrap();
        drop(lease);

        // Wait for the spawned restore to run.
        timeout(Duration::from_secs(1), async {
            while pool.idle_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let visits = visits.lock().unwrap();
        assert_eq!(
            visits.as_slice(),
            ["0:https://example.com/jobs", "0:https://example.com/home"]
        );
    }

    #[tokio::test]
    async fn test_acquire_returns_released_page() {
        let (pool, _visits) = recording_pool(1);

        let lease = pool.acquire().await.unwrap();
        drop(lease);

        let lease = timeout(Duration::from_secs(1), pool.acquire())
            .await
            .unwrap()
            .unwrap();
        drop(lease);
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_acquire_blocks_at_capacity_until_release() {
        let (pool, _visits) = recording_pool(1);

        let lease = pool.acquire().await.unwrap();

        // Second acquire must not complete while the lease is held.
        let blocked = timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err(), "acquire should block at capacity");

        drop(lease);

        let lease = timeout(Duration::from_secs(1), pool.acquire())
            .await
            .expect("acquire should complete after release")
            .unwrap();
        drop(lease);
    }

    #[tokio::test]
    async fn test_concurrent_acquires_get_distinct_pages() {
        let (pool, _visits) = recording_pool(2);

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_eq!(pool.idle_count(), 0);
        drop(first);
        drop(second);

        // Both pages come back.
        timeout(Duration::from_secs(1), async {
            while pool.idle_count() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
