//! CLI entry point for the bidding agent.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use autobid_core::{
    AppContext, Config, Credentials, Database, RemoteDriver, SearchTarget, SiteUrls, TaskQueue,
    TaskStatus, Worker,
};
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, info};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    match args.command {
        Command::Run {
            driver_url,
            pool_size,
            poll_interval,
            marker_file,
            login_url,
            home_url,
            targets,
            avoid_words,
            status_endpoint,
            payload_endpoint,
        } => {
            let targets = targets
                .iter()
                .map(|raw| SearchTarget::parse(raw))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let config = Config {
                database_path: args.database.clone(),
                marker_path: marker_file,
                pool_size: usize::from(pool_size),
                poll_interval: Duration::from_millis(poll_interval),
                credentials: Credentials::from_env()?,
                site: SiteUrls {
                    login_url,
                    home_url,
                },
                targets,
                avoid_words,
                status_endpoint,
                payload_endpoint,
            };
            run(config, &driver_url).await
        }
        Command::Enqueue {
            kind,
            payload,
            priority,
        } => enqueue(&args.database, &kind, payload.as_deref(), priority).await,
        Command::Status => status(&args.database).await,
    }
}

/// Runs the worker loop until ctrl-c.
async fn run(config: Config, driver_url: &str) -> Result<()> {
    info!("Autobid starting");

    let db = Database::new(&config.database_path)
        .await
        .context("opening database")?;

    let driver = RemoteDriver::new(driver_url);
    let pages = driver
        .open_pages(config.pool_size)
        .await
        .context("opening browser pages")?;

    let ctx = Arc::new(AppContext::new(config, db, pages));

    // Repair tasks left mid-flight by a previous run, before any claims.
    let recovered = ctx
        .queue
        .recover_orphans()
        .await
        .context("recovering orphaned tasks")?;
    if recovered > 0 {
        info!(recovered, "reset orphaned tasks to pending");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    Worker::new(ctx, shutdown_rx).run().await;
    Ok(())
}

/// Adds one task against the shared database file.
async fn enqueue(database: &Path, kind: &str, payload: Option<&str>, priority: i64) -> Result<()> {
    let payload = payload
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("payload is not valid JSON")?;

    let db = Database::new(database).await.context("opening database")?;
    let queue = TaskQueue::new(db);
    let id = queue.enqueue(kind, payload.as_ref(), priority).await?;

    info!(task_id = id, kind, priority, "task enqueued");
    println!("{id}");
    Ok(())
}

/// Prints task counts per status.
async fn status(database: &Path) -> Result<()> {
    let db = Database::new(database).await.context("opening database")?;
    let queue = TaskQueue::new(db);

    for status in [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Done,
        TaskStatus::Failed,
        TaskStatus::Aborted,
    ] {
        let count = queue.count_by_status(status).await?;
        println!("{:>10}  {count}", status.as_str());
    }
    Ok(())
}
