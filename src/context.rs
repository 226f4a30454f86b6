//! Shared application context.
//!
//! All long-lived collaborators are built once at startup and handed to
//! the worker behind an `Arc`; nothing in the crate reaches for global
//! state.

use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::markers::MarkerStore;
use crate::page::BrowserPage;
use crate::pool::PagePool;
use crate::queue::TaskQueue;
use crate::records::{RecordStore, SqliteRecordStore};
use crate::sink::StatusSink;

/// Everything a worker needs to process tasks.
pub struct AppContext {
    /// Runtime configuration.
    pub config: Config,
    /// Durable task queue.
    pub queue: TaskQueue,
    /// Bounded browser page pool.
    pub pool: PagePool,
    /// Job/proposal record store.
    pub records: Arc<dyn RecordStore>,
    /// Per-target last-seen markers.
    pub markers: MarkerStore,
    /// Outcome/payload delivery sink.
    pub sink: StatusSink,
}

impl AppContext {
    /// Wires the context from configuration, an open database, and the
    /// browser pages the pool will own.
    #[must_use]
    pub fn new(config: Config, db: Database, pages: Vec<Box<dyn BrowserPage>>) -> Self {
        let queue = TaskQueue::new(db.clone());
        let records: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(db));
        let pool = PagePool::new(pages, "browser", &config.site.home_url);
        let markers = MarkerStore::new(&config.marker_path);
        let sink = StatusSink::new(
            config.status_endpoint.clone(),
            config.payload_endpoint.clone(),
        );

        Self {
            config,
            queue,
            pool,
            records,
            markers,
            sink,
        }
    }
}
