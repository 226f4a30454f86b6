//! Autobid Core Library
//!
//! Job-orchestration core for a freelance-marketplace bidding agent:
//! a durable priority task queue over `SQLite`, a bounded pool of
//! reusable browser pages, and step-driven sessions that discover
//! postings and submit proposals.
//!
//! # Architecture
//!
//! - [`db`] - Database connection and schema management
//! - [`queue`] - Durable task queue with atomic claiming
//! - [`pool`] - Bounded browser-page pool with RAII leases
//! - [`page`] - Browser automation boundary and driver client
//! - [`session`] - Step-driven discovery and apply sessions
//! - [`worker`] - The claim/run/record worker loop
//! - [`filter`] - Pure policy filter over discovered jobs
//! - [`jobs`] - Typed job, proposal, and question records
//! - [`records`] - Job/proposal record store
//! - [`sink`] - Best-effort status and payload delivery
//! - [`markers`] - Per-target last-seen marker persistence
//! - [`config`] / [`context`] - Configuration and shared wiring

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod db;
pub mod filter;
pub mod jobs;
pub mod markers;
pub mod page;
pub mod pool;
pub mod queue;
pub mod records;
pub mod session;
pub mod sink;
pub mod worker;

// Re-export commonly used types
pub use config::{Config, Credentials, SearchTarget, SiteUrls};
pub use context::AppContext;
pub use db::Database;
pub use filter::JobFilter;
pub use jobs::{JobDetails, Proposal};
pub use page::{BrowserPage, PageError, RemoteDriver};
pub use pool::{PageLease, PagePool};
pub use queue::{QueueError, Task, TaskKind, TaskQueue, TaskStatus};
pub use records::{AddOutcome, RecordStore, SqliteRecordStore};
pub use session::{SessionOutcome, SessionStatus};
pub use sink::StatusSink;
pub use worker::Worker;
