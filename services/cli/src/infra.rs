use chrono::{DateTime, Utc};
use haitaton_sync::error::AppError;
use haitaton_sync::workflows::hakemus::{
    ApplicationAttachment, ApplicationData, ApplicationId, ApplicationRecord,
    ApplicationRepository, AttachmentError, AttachmentSource, AuditEntry, AuditError, AuditLog,
    CheckpointRepository, InformationRequest, ProjectDirectory, ProjectExtent,
    ProjectLookupError, ProjectReference, RegistryClient, RegistryClientError, RegistryId,
    RegistryStatus, RegistryStatusSnapshot, RepositoryError, StatusEvent, StatusHistorySource,
    SyncCheckpoint, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument {
    #[serde(default)]
    sequence: u64,
    #[serde(default)]
    applications: Vec<ApplicationRecord>,
    #[serde(default)]
    checkpoint: Option<SyncCheckpoint>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocumentView<'a> {
    sequence: u64,
    applications: Vec<&'a ApplicationRecord>,
    checkpoint: Option<SyncCheckpoint>,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    sequence: u64,
    records: BTreeMap<ApplicationId, ApplicationRecord>,
    checkpoint: Option<SyncCheckpoint>,
}

/// Application store kept in a single JSON document.
///
/// Every mutation rewrites the whole document through a sibling temp file and a rename, so a
/// crash leaves either the previous or the next version on disk.
#[derive(Debug)]
pub(crate) struct FileApplicationRepository {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileApplicationRepository {
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let document = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str::<StoreDocument>(&raw)?
        } else {
            StoreDocument::default()
        };

        let records: BTreeMap<ApplicationId, ApplicationRecord> = document
            .applications
            .into_iter()
            .map(|record| (record.id, record))
            .collect();
        let highest = records.keys().next_back().map_or(0, |id| id.0);
        debug!(path = %path.display(), applications = records.len(), "opened application store");

        Ok(Self {
            path,
            state: Mutex::new(StoreState {
                sequence: document.sequence.max(highest),
                records,
                checkpoint: document.checkpoint,
            }),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Apply `change` to a copy of the state and keep it only once it is on disk.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut StoreState) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let outcome = change(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(outcome)
    }

    fn persist(&self, state: &StoreState) -> Result<(), RepositoryError> {
        let view = StoreDocumentView {
            sequence: state.sequence,
            applications: state.records.values().collect(),
            checkpoint: state.checkpoint,
        };
        let bytes = serde_json::to_vec_pretty(&view).map_err(unavailable)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, bytes).map_err(unavailable)?;
        fs::rename(&staging, &self.path).map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}

impl ApplicationRepository for FileApplicationRepository {
    fn next_id(&self) -> Result<ApplicationId, RepositoryError> {
        self.commit(|state| {
            state.sequence += 1;
            Ok(ApplicationId(state.sequence))
        })
    }

    fn save(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.commit(|state| {
            state.sequence = state.sequence.max(record.id.0);
            state.records.insert(record.id, record.clone());
            Ok(record)
        })
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
        self.commit(|state| {
            state
                .records
                .remove(&id)
                .map(|_| ())
                .ok_or(RepositoryError::NotFound)
        })
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

impl CheckpointRepository for FileApplicationRepository {
    fn load_checkpoint(&self) -> Result<Option<SyncCheckpoint>, RepositoryError> {
        Ok(self.lock()?.checkpoint)
    }

    fn store_checkpoint(&self, checkpoint: SyncCheckpoint) -> Result<(), RepositoryError> {
        self.commit(|state| {
            state.checkpoint = Some(checkpoint);
            Ok(())
        })
    }
}

/// Registry status history exported as a JSON array of events.
#[derive(Debug, Clone)]
pub(crate) struct FileHistoryFeed {
    path: PathBuf,
}

impl FileHistoryFeed {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StatusHistorySource for FileHistoryFeed {
    fn fetch_status_history(
        &self,
        registry_ids: &[RegistryId],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusEvent>, RegistryClientError> {
        let events = read_events(&self.path)
            .map_err(|err| RegistryClientError::Unreachable(err.to_string()))?;
        Ok(events
            .into_iter()
            .filter(|event| registry_ids.contains(&event.registry_id))
            .filter(|event| since.map_or(true, |since| event.event_time > since))
            .collect())
    }
}

pub(crate) fn read_events(path: &Path) -> Result<Vec<StatusEvent>, AppError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

/// Project directory backed by a fixed list of extents.
#[derive(Debug, Clone, Default)]
pub(crate) struct StaticProjectDirectory {
    projects: HashMap<ProjectReference, ProjectExtent>,
}

impl StaticProjectDirectory {
    pub(crate) fn new(extents: impl IntoIterator<Item = ProjectExtent>) -> Self {
        Self {
            projects: extents
                .into_iter()
                .map(|extent| (extent.reference.clone(), extent))
                .collect(),
        }
    }
}

impl ProjectDirectory for StaticProjectDirectory {
    fn resolve(
        &self,
        reference: &ProjectReference,
    ) -> Result<Option<ProjectExtent>, ProjectLookupError> {
        Ok(self.projects.get(reference).cloned())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NoAttachments;

impl AttachmentSource for NoAttachments {
    fn unsent(
        &self,
        _application_id: ApplicationId,
    ) -> Result<Vec<ApplicationAttachment>, AttachmentError> {
        Ok(Vec::new())
    }

    fn mark_sent(
        &self,
        _application_id: ApplicationId,
        _attachment_id: &str,
    ) -> Result<(), AttachmentError> {
        Ok(())
    }
}

/// Audit trail written to the tracing output.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            action = ?entry.action,
            application_id = %entry.application_id,
            actor = %entry.actor,
            "audit"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    created: u64,
    writes: usize,
    statuses: HashMap<RegistryId, RegistryStatusSnapshot>,
    decisions: HashMap<RegistryId, Vec<u8>>,
}

/// Stand-in registry for the demo; the script moves statuses forward itself.
#[derive(Debug, Default)]
pub(crate) struct InMemoryRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryRegistry {
    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>, RegistryClientError> {
        self.state
            .lock()
            .map_err(|_| RegistryClientError::Unreachable("registry mutex poisoned".to_string()))
    }

    pub(crate) fn advance(
        &self,
        registry_id: RegistryId,
        status: RegistryStatus,
    ) -> Result<(), RegistryClientError> {
        let mut state = self.lock()?;
        let snapshot = state
            .statuses
            .entry(registry_id)
            .or_insert(RegistryStatusSnapshot {
                status: None,
                identifier: None,
            });
        snapshot.status = Some(status);
        Ok(())
    }

    pub(crate) fn publish_decision(
        &self,
        registry_id: RegistryId,
        bytes: Vec<u8>,
    ) -> Result<(), RegistryClientError> {
        self.lock()?.decisions.insert(registry_id, bytes);
        Ok(())
    }

    pub(crate) fn writes(&self) -> Result<usize, RegistryClientError> {
        Ok(self.lock()?.writes)
    }
}

impl RegistryClient for InMemoryRegistry {
    fn create(&self, _data: &ApplicationData) -> Result<RegistryId, RegistryClientError> {
        let mut state = self.lock()?;
        state.created += 1;
        state.writes += 1;
        let registry_id = RegistryId(4_200 + state.created);
        let identifier = format!("JS24{:05}", state.created);
        state.statuses.insert(
            registry_id,
            RegistryStatusSnapshot {
                status: Some(RegistryStatus::Pending),
                identifier: Some(identifier),
            },
        );
        Ok(registry_id)
    }

    fn update(
        &self,
        _registry_id: RegistryId,
        _data: &ApplicationData,
    ) -> Result<(), RegistryClientError> {
        self.lock()?.writes += 1;
        Ok(())
    }

    fn cancel(&self, registry_id: RegistryId) -> Result<(), RegistryClientError> {
        self.lock()?.writes += 1;
        self.advance(registry_id, RegistryStatus::Cancelled)
    }

    fn fetch_status(
        &self,
        registry_id: RegistryId,
    ) -> Result<RegistryStatusSnapshot, RegistryClientError> {
        Ok(self
            .lock()?
            .statuses
            .get(&registry_id)
            .cloned()
            .unwrap_or(RegistryStatusSnapshot {
                status: None,
                identifier: None,
            }))
    }

    fn fetch_decision_document(
        &self,
        registry_id: RegistryId,
    ) -> Result<Vec<u8>, RegistryClientError> {
        self.lock()?
            .decisions
            .get(&registry_id)
            .cloned()
            .ok_or(RegistryClientError::DecisionNotFound)
    }

    fn upload_attachment(
        &self,
        _registry_id: RegistryId,
        _attachment: &ApplicationAttachment,
    ) -> Result<(), RegistryClientError> {
        Ok(())
    }

    fn fetch_pending_information_request(
        &self,
        _registry_id: RegistryId,
    ) -> Result<Option<InformationRequest>, RegistryClientError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use haitaton_sync::workflows::hakemus::{ApplicationType, CableReportData, Polygon};
    use tempfile::tempdir;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn record(id: u64, registry_id: Option<u64>) -> ApplicationRecord {
        let data = ApplicationData::CableReport(CableReportData {
            name: Some(format!("Johtoselvitys {id}")),
            work_description: None,
            start_time: None,
            end_time: None,
            rock_excavation: None,
            construction_work: false,
            maintenance_work: false,
            emergency_work: false,
            property_connectivity: false,
            areas: None,
            customer_with_contacts: None,
            contractor_with_contacts: None,
            representative_with_contacts: None,
            property_developer_with_contacts: None,
            pending_on_client: true,
        });
        ApplicationRecord {
            id: ApplicationId(id),
            registry_id: registry_id.map(RegistryId),
            registry_identifier: None,
            registry_status: registry_id.map(|_| RegistryStatus::Pending),
            application_type: ApplicationType::CableReport,
            data,
            project: ProjectReference("HAI24-3".to_string()),
            created_by: UserId("user-1".to_string()),
            created_at: at(1),
            modified_at: None,
        }
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("store.json");

        let store = FileApplicationRepository::open(&path).expect("open");
        let id = store.next_id().expect("id");
        store.save(record(id.0, Some(77))).expect("save");
        store
            .store_checkpoint(SyncCheckpoint {
                last_processed_timestamp: at(3),
            })
            .expect("checkpoint");
        drop(store);

        let reopened = FileApplicationRepository::open(&path).expect("reopen");
        assert_eq!(reopened.find_by_id(id).expect("record"), record(id.0, Some(77)));
        assert_eq!(
            reopened
                .find_by_registry_id(RegistryId(77))
                .expect("lookup")
                .map(|record| record.id),
            Some(id)
        );
        assert_eq!(
            reopened.load_checkpoint().expect("checkpoint"),
            Some(SyncCheckpoint {
                last_processed_timestamp: at(3)
            })
        );
        assert_eq!(reopened.next_id().expect("id"), ApplicationId(id.0 + 1));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn deleted_records_stay_deleted_on_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("store.json");
        let store = FileApplicationRepository::open(&path).expect("open");
        store.save(record(1, None)).expect("save");
        store.save(record(2, Some(5))).expect("save");

        store.delete(ApplicationId(1)).expect("delete");
        assert!(matches!(
            store.delete(ApplicationId(1)),
            Err(RepositoryError::NotFound)
        ));

        let reopened = FileApplicationRepository::open(store.path()).expect("reopen");
        assert!(matches!(
            reopened.find_by_id(ApplicationId(1)),
            Err(RepositoryError::NotFound)
        ));
        assert_eq!(reopened.registry_ids().expect("ids"), vec![RegistryId(5)]);
    }

    #[test]
    fn failed_write_keeps_previous_state() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("store.json");
        let store = FileApplicationRepository::open(&path).expect("open");

        assert!(matches!(
            store.save(record(1, None)),
            Err(RepositoryError::Unavailable(_))
        ));
        assert!(matches!(
            store.find_by_id(ApplicationId(1)),
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn history_feed_filters_by_id_and_checkpoint() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[
                {"registryId": 1, "eventTime": "2024-05-02T08:00:00Z", "status": "PENDING"},
                {"registryId": 1, "eventTime": "2024-05-04T08:00:00Z", "status": "HANDLING"},
                {"registryId": 2, "eventTime": "2024-05-04T09:00:00Z", "status": "DECISIONMAKING"}
            ]"#,
        )
        .expect("write feed");
        let feed = FileHistoryFeed::new(&path);

        let events = feed
            .fetch_status_history(&[RegistryId(1)], Some(at(3)))
            .expect("events");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, RegistryStatus::Handling);
    }

    #[test]
    fn missing_feed_reports_unreachable_source() {
        let dir = tempdir().expect("tempdir");
        let feed = FileHistoryFeed::new(dir.path().join("absent.json"));

        assert!(matches!(
            feed.fetch_status_history(&[RegistryId(1)], None),
            Err(RegistryClientError::Unreachable(_))
        ));
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        assert_eq!(
            parse_timestamp("2024-05-03T12:00:00+00:00").expect("valid"),
            at(3)
        );
        assert!(parse_timestamp("3.5.2024").is_err());
    }

    #[test]
    fn static_directory_resolves_known_projects_only() {
        let extent = ProjectExtent {
            reference: ProjectReference("HAI24-3".to_string()),
            areas: vec![Polygon::from_points(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)])],
            requires_area_containment: false,
        };
        let directory = StaticProjectDirectory::new([extent.clone()]);

        assert_eq!(
            directory
                .resolve(&ProjectReference("HAI24-3".to_string()))
                .expect("lookup"),
            Some(extent)
        );
        assert_eq!(
            directory
                .resolve(&ProjectReference("HAI24-4".to_string()))
                .expect("lookup"),
            None
        );
    }

    #[test]
    fn registry_counts_writes_and_surfaces_poisoning() {
        let registry = std::sync::Arc::new(InMemoryRegistry::default());
        let registry_id = registry.create(&record(1, None).data).expect("created");
        registry.update(registry_id, &record(1, None).data).expect("updated");
        assert_eq!(registry.writes().expect("readable"), 2);

        let poisoner = registry.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().expect("first lock");
            panic!("poison the registry");
        })
        .join();

        assert!(matches!(
            registry.writes(),
            Err(RegistryClientError::Unreachable(_))
        ));
    }
}
