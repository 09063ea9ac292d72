use crate::infra::{read_events, FileApplicationRepository, FileHistoryFeed};
use chrono::{DateTime, Utc};
use clap::Args;
use haitaton_sync::config::SyncConfig;
use haitaton_sync::error::AppError;
use haitaton_sync::workflows::hakemus::{HistoryProcessor, HistorySummary, HistoryUpdater};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub(crate) struct IngestArgs {
    /// JSON array of registry status events to fold into the store
    #[arg(long)]
    pub(crate) events: PathBuf,
    /// Checkpoint to record for this batch (RFC 3339). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) as_of: Option<DateTime<Utc>>,
    /// Override the configured application store
    #[arg(long)]
    pub(crate) store: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct PollArgs {
    /// JSON status history feed to poll
    #[arg(long)]
    pub(crate) feed: PathBuf,
    /// Stop after this many polls instead of running until interrupted
    #[arg(long)]
    pub(crate) iterations: Option<u32>,
    /// Override the configured poll interval in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) interval_secs: Option<u64>,
    /// Override the configured application store
    #[arg(long)]
    pub(crate) store: Option<PathBuf>,
}

pub(crate) fn run_ingest(args: IngestArgs, config: &SyncConfig) -> Result<(), AppError> {
    let IngestArgs {
        events,
        as_of,
        store,
    } = args;
    let store_path = store.unwrap_or_else(|| config.store_path.clone());
    let as_of = as_of.unwrap_or_else(Utc::now);

    let summary = ingest_events(&store_path, &events, as_of)?;
    print_summary(&summary);
    Ok(())
}

pub(crate) fn ingest_events(
    store_path: &Path,
    events_path: &Path,
    as_of: DateTime<Utc>,
) -> Result<HistorySummary, AppError> {
    let store = Arc::new(FileApplicationRepository::open(store_path)?);
    let events = read_events(events_path)?;
    info!(
        store = %store_path.display(),
        events = events.len(),
        %as_of,
        "ingesting status history batch"
    );
    let processor = HistoryProcessor::new(store.clone(), store);
    Ok(processor.handle_history_batch(events, as_of)?)
}

pub(crate) async fn run_poll(args: PollArgs, config: &SyncConfig) -> Result<(), AppError> {
    let PollArgs {
        feed,
        iterations,
        interval_secs,
        store,
    } = args;
    let store_path = store.unwrap_or_else(|| config.store_path.clone());
    let period = interval_secs
        .map(Duration::from_secs)
        .unwrap_or(config.poll_interval);

    let store = Arc::new(FileApplicationRepository::open(&store_path)?);
    info!(
        store = %store.path().display(),
        feed = %feed.display(),
        period_secs = period.as_secs(),
        "polling registry status history"
    );
    let updater = HistoryUpdater::new(store.clone(), store, Arc::new(FileHistoryFeed::new(&feed)));

    let mut ticker = tokio::time::interval(period);
    let mut completed: u32 = 0;
    loop {
        ticker.tick().await;
        match updater.run_once(Utc::now()) {
            Ok(summary) => print_summary(&summary),
            Err(err) => warn!(error = %err, "history update failed, checkpoint left in place"),
        }
        completed += 1;
        if iterations.is_some_and(|limit| completed >= limit) {
            break;
        }
    }
    Ok(())
}

fn print_summary(summary: &HistorySummary) {
    println!(
        "Processed {} events: {} applied, {} unknown (checkpoint {})",
        summary.events,
        summary.applied,
        summary.skipped_unknown,
        summary.checkpoint.to_rfc3339()
    );
}
