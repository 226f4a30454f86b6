//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Queue-driven bidding agent for a freelance marketplace.
///
/// Autobid drains a durable task queue: discovery tasks crawl the
/// configured search pages for worthwhile postings, apply tasks submit
/// previously generated proposals through a browser driver sidecar.
#[derive(Parser, Debug)]
#[command(name = "autobid")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path of the SQLite database file
    #[arg(long, default_value = "autobid.db", global = true)]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the worker loop until interrupted
    Run {
        /// Base URL of the browser driver sidecar
        #[arg(long, default_value = "http://127.0.0.1:9333")]
        driver_url: String,

        /// Number of pooled browser pages (1-16)
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=16))]
        pool_size: u8,

        /// Sleep between empty queue polls, in milliseconds
        #[arg(long, default_value_t = 5000)]
        poll_interval: u64,

        /// File holding per-target last-seen links
        #[arg(long, default_value = "markers.json")]
        marker_file: PathBuf,

        /// Marketplace login page URL
        #[arg(long)]
        login_url: String,

        /// Neutral URL where pooled pages are parked between tasks
        #[arg(long)]
        home_url: String,

        /// Search target in name=url form; repeat for multiple targets
        #[arg(long = "target")]
        targets: Vec<String>,

        /// Extra avoid-list word for the job filter; repeatable
        #[arg(long = "avoid")]
        avoid_words: Vec<String>,

        /// Endpoint receiving session outcome reports
        #[arg(long)]
        status_endpoint: Option<String>,

        /// Endpoint receiving accepted-job payloads
        #[arg(long)]
        payload_endpoint: Option<String>,
    },

    /// Add a task to the queue and print its id
    Enqueue {
        /// Task kind, e.g. discover_jobs or apply_to_job
        kind: String,

        /// JSON payload for the task
        #[arg(long)]
        payload: Option<String>,

        /// Higher priority tasks are claimed first
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },

    /// Show task counts per status
    Status,
}
