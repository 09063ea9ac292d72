use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationData, ApplicationId, ApplicationType, ProjectReference, RegistryId, RegistryStatus,
    UserId,
};
use super::state::ApplicationState;

/// Persisted application row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub registry_id: Option<RegistryId>,
    pub registry_identifier: Option<String>,
    pub registry_status: Option<RegistryStatus>,
    pub application_type: ApplicationType,
    pub data: ApplicationData,
    pub project: ProjectReference,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    /// State as far as the stored fields tell; the engine re-derives it from a fresh
    /// registry status before acting.
    pub fn state(&self) -> ApplicationState {
        ApplicationState::classify(
            self.registry_id,
            self.registry_status,
            self.data.pending_on_client(),
        )
    }
}

/// Watermark of the most recent history batch folded into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCheckpoint {
    pub last_processed_timestamp: DateTime<Utc>,
}

/// Storage abstraction so the engine can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    fn next_id(&self) -> Result<ApplicationId, RepositoryError>;
    fn save(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    /// Fails with [`RepositoryError::NotFound`] when absent.
    fn find_by_id(&self, id: ApplicationId) -> Result<ApplicationRecord, RepositoryError>;
    fn find_by_registry_id(
        &self,
        registry_id: RegistryId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError>;
    fn list_by_user(&self, user: &UserId) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn registry_ids(&self) -> Result<Vec<RegistryId>, RepositoryError>;
}

/// Single-row store for the history ingestion watermark.
pub trait CheckpointRepository: Send + Sync {
    fn load_checkpoint(&self) -> Result<Option<SyncCheckpoint>, RepositoryError>;
    fn store_checkpoint(&self, checkpoint: SyncCheckpoint) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default)]
struct StoreState {
    sequence: u64,
    records: BTreeMap<ApplicationId, ApplicationRecord>,
    checkpoint: Option<SyncCheckpoint>,
}

/// Process-local store used by the demo and by tests.
#[derive(Debug, Default)]
pub struct InMemoryApplicationStore {
    state: Mutex<StoreState>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.len()? == 0)
    }
}

impl ApplicationRepository for InMemoryApplicationStore {
    fn next_id(&self) -> Result<ApplicationId, RepositoryError> {
        let mut state = self.lock()?;
        state.sequence += 1;
        Ok(ApplicationId(state.sequence))
    }

    fn save(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut state = self.lock()?;
        state.sequence = state.sequence.max(record.id.0);
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_by_id(&self, id: ApplicationId) -> Result<ApplicationRecord, RepositoryError> {
        self.lock()?
            .records
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    fn find_by_registry_id(
        &self,
        registry_id: RegistryId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .records
            .values()
            .find(|record| record.registry_id == Some(registry_id))
            .cloned())
    }

    fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError> {
        self.lock()?
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn list_by_user(&self, user: &UserId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|record| &record.created_by == user)
            .cloned()
            .collect())
    }

    fn registry_ids(&self) -> Result<Vec<RegistryId>, RepositoryError> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter_map(|record| record.registry_id)
            .collect())
    }
}

impl CheckpointRepository for InMemoryApplicationStore {
    fn load_checkpoint(&self) -> Result<Option<SyncCheckpoint>, RepositoryError> {
        Ok(self.lock()?.checkpoint)
    }

    fn store_checkpoint(&self, checkpoint: SyncCheckpoint) -> Result<(), RepositoryError> {
        self.lock()?.checkpoint = Some(checkpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn poisoned_store_reports_unavailable_instead_of_empty() {
        let store = Arc::new(InMemoryApplicationStore::new());
        assert_eq!(store.len().expect("readable"), 0);
        assert!(store.is_empty().expect("readable"));

        let poisoner = store.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.state.lock().expect("first lock");
            panic!("poison the store");
        })
        .join();

        assert!(matches!(store.len(), Err(RepositoryError::Unavailable(_))));
        assert!(matches!(store.is_empty(), Err(RepositoryError::Unavailable(_))));
    }
}
