//! Folding of remote status history into the local store.
//!
//! Only the latest event per registry id matters: intermediate statuses are never observable
//! locally, so a batch is reduced by key to its maximum-timestamp event instead of being
//! replayed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{RegistryId, StatusEvent};
use super::registry::{RegistryClientError, StatusHistorySource};
use super::repository::{
    ApplicationRepository, CheckpointRepository, RepositoryError, SyncCheckpoint,
};

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    pub events: usize,
    pub applied: usize,
    pub skipped_unknown: usize,
    pub checkpoint: DateTime<Utc>,
}

/// Reduce a batch to the latest event per registry id. Ties go to the event seen last.
pub fn fold_latest(events: Vec<StatusEvent>) -> BTreeMap<RegistryId, StatusEvent> {
    let mut latest: BTreeMap<RegistryId, StatusEvent> = BTreeMap::new();
    for event in events {
        match latest.get(&event.registry_id) {
            Some(current) if current.event_time > event.event_time => {}
            _ => {
                latest.insert(event.registry_id, event);
            }
        }
    }
    latest
}

pub struct HistoryProcessor<R, K> {
    repository: Arc<R>,
    checkpoints: Arc<K>,
}

impl<R, K> HistoryProcessor<R, K>
where
    R: ApplicationRepository + 'static,
    K: CheckpointRepository + 'static,
{
    pub fn new(repository: Arc<R>, checkpoints: Arc<K>) -> Self {
        Self {
            repository,
            checkpoints,
        }
    }

    pub fn last_processed(&self) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self
            .checkpoints
            .load_checkpoint()?
            .map(|checkpoint| checkpoint.last_processed_timestamp))
    }

    /// Apply a batch and move the checkpoint to `as_of`, even when nothing matched.
    ///
    /// A storage failure aborts the run before the checkpoint moves, so the batch is offered
    /// again; re-folding it is harmless.
    pub fn handle_history_batch(
        &self,
        events: Vec<StatusEvent>,
        as_of: DateTime<Utc>,
    ) -> Result<HistorySummary, RepositoryError> {
        let total = events.len();
        let latest = fold_latest(events);
        let mut applied = 0;
        let mut skipped_unknown = 0;

        for (registry_id, event) in latest {
            let Some(mut record) = self.repository.find_by_registry_id(registry_id)? else {
                warn!(%registry_id, "status event for unknown application, skipping");
                skipped_unknown += 1;
                continue;
            };

            debug!(
                application_id = %record.id,
                %registry_id,
                status = ?event.status,
                event_time = %event.event_time,
                "applying latest registry status"
            );
            record.registry_status = Some(event.status);
            if let Some(identifier) = event.identifier {
                record.registry_identifier = Some(identifier);
            }
            self.repository.save(record)?;
            applied += 1;
        }

        self.checkpoints.store_checkpoint(SyncCheckpoint {
            last_processed_timestamp: as_of,
        })?;

        let summary = HistorySummary {
            events: total,
            applied,
            skipped_unknown,
            checkpoint: as_of,
        };
        info!(
            events = summary.events,
            applied = summary.applied,
            skipped = summary.skipped_unknown,
            checkpoint = %summary.checkpoint,
            "history batch processed"
        );
        Ok(summary)
    }
}

/// Pulls history for every known registry id since the checkpoint and folds it.
pub struct HistoryUpdater<R, K, S> {
    processor: HistoryProcessor<R, K>,
    repository: Arc<R>,
    source: Arc<S>,
}

impl<R, K, S> HistoryUpdater<R, K, S>
where
    R: ApplicationRepository + 'static,
    K: CheckpointRepository + 'static,
    S: StatusHistorySource + 'static,
{
    pub fn new(repository: Arc<R>, checkpoints: Arc<K>, source: Arc<S>) -> Self {
        Self {
            processor: HistoryProcessor::new(repository.clone(), checkpoints),
            repository,
            source,
        }
    }

    pub fn processor(&self) -> &HistoryProcessor<R, K> {
        &self.processor
    }

    pub fn run_once(&self, now: DateTime<Utc>) -> Result<HistorySummary, HistoryUpdateError> {
        let registry_ids = self.repository.registry_ids()?;
        let events = if registry_ids.is_empty() {
            // The registry reads an empty id list as "every application".
            info!("no submitted applications, skipping registry history query");
            Vec::new()
        } else {
            let since = self.processor.last_processed()?;
            self.source.fetch_status_history(&registry_ids, since)?
        };

        Ok(self.processor.handle_history_batch(events, now)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryUpdateError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("fetching status history failed: {0}")]
    Source(#[from] RegistryClientError),
}
