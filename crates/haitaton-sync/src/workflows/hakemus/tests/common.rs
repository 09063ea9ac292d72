use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::workflows::hakemus::collaborators::{
    AttachmentError, AttachmentSource, AuditEntry, AuditError, AuditLog, ProjectDirectory,
    ProjectExtent, ProjectLookupError,
};
use crate::workflows::hakemus::domain::{
    ApplicationAttachment, ApplicationData, ApplicationId, CableReportArea, CableReportData,
    Contact, Customer, CustomerType, CustomerWithContacts, ExcavationArea,
    ExcavationNotificationData, ProjectReference, RegistryId, RegistryStatus, StatusEvent, UserId,
};
use crate::workflows::hakemus::geometry::Polygon;
use crate::workflows::hakemus::registry::{
    InformationRequest, RegistryClient, RegistryClientError, RegistryStatusSnapshot,
    StatusHistorySource,
};
use crate::workflows::hakemus::repository::InMemoryApplicationStore;
use crate::workflows::hakemus::service::{Collaborators, HakemusService};

pub(super) fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn user() -> UserId {
    UserId("user-1".to_string())
}

pub(super) fn project() -> ProjectReference {
    ProjectReference("HAI24-1".to_string())
}

pub(super) fn square(x: f64, y: f64, size: f64) -> Polygon {
    Polygon::from_points(&[(x, y), (x + size, y), (x + size, y + size), (x, y + size)])
}

pub(super) fn project_extent() -> ProjectExtent {
    ProjectExtent {
        reference: project(),
        areas: vec![square(25_000.0, 6_670_000.0, 1_000.0)],
        requires_area_containment: true,
    }
}

pub(super) fn bowtie() -> Polygon {
    Polygon::from_points(&[
        (25_100.0, 6_670_100.0),
        (25_200.0, 6_670_200.0),
        (25_200.0, 6_670_100.0),
        (25_100.0, 6_670_200.0),
    ])
}

pub(super) fn customer_group(name: &str, orderer: bool) -> CustomerWithContacts {
    CustomerWithContacts {
        customer: Customer {
            customer_type: Some(CustomerType::Company),
            name: name.to_string(),
            email: Some("info@example.test".to_string()),
            phone: Some("0401234567".to_string()),
            registry_key: Some("1234567-8".to_string()),
        },
        contacts: vec![Contact {
            first_name: "Teppo".to_string(),
            last_name: "Testihenkilö".to_string(),
            email: "teppo@example.test".to_string(),
            phone: Some("0401234567".to_string()),
            orderer,
        }],
    }
}

pub(super) fn cable_report() -> CableReportData {
    CableReportData {
        name: Some("Johtoselvitys Mannerheimintie".to_string()),
        work_description: Some("Kaapelin korjaus".to_string()),
        start_time: Some(at(10)),
        end_time: Some(at(20)),
        rock_excavation: Some(false),
        construction_work: true,
        maintenance_work: false,
        emergency_work: false,
        property_connectivity: false,
        areas: Some(vec![CableReportArea {
            name: "Alue 1".to_string(),
            geometry: square(25_100.0, 6_670_100.0, 50.0),
        }]),
        customer_with_contacts: Some(customer_group("Kaivuu Oy", true)),
        contractor_with_contacts: Some(customer_group("Urakoitsija Oy", false)),
        representative_with_contacts: None,
        property_developer_with_contacts: None,
        pending_on_client: false,
    }
}

pub(super) fn cable_report_data() -> ApplicationData {
    ApplicationData::CableReport(cable_report())
}

pub(super) fn excavation_notification() -> ExcavationNotificationData {
    ExcavationNotificationData {
        name: Some("Kaivuilmoitus Aleksanterinkatu".to_string()),
        work_description: Some("Vesijohdon uusiminen".to_string()),
        start_time: Some(at(10)),
        end_time: Some(at(20)),
        rock_excavation: Some(true),
        construction_work: true,
        maintenance_work: false,
        emergency_work: false,
        cable_report_done: true,
        cable_reports: vec!["JS2400001".to_string()],
        required_competence: true,
        additional_info: None,
        areas: Some(vec![ExcavationArea {
            name: "Hankealue 1".to_string(),
            street_address: "Aleksanterinkatu 1".to_string(),
            work_areas: vec![square(25_300.0, 6_670_300.0, 20.0)],
        }]),
        customer_with_contacts: Some(customer_group("Kaivuu Oy", true)),
        contractor_with_contacts: Some(customer_group("Urakoitsija Oy", false)),
        representative_with_contacts: None,
        property_developer_with_contacts: None,
        pending_on_client: false,
    }
}

pub(super) fn attachment(id: &str) -> ApplicationAttachment {
    ApplicationAttachment {
        id: id.to_string(),
        file_name: format!("{id}.pdf"),
        content_type: "application/pdf".to_string(),
        content: vec![0x25, 0x50, 0x44, 0x46],
    }
}

pub(super) fn event(registry_id: u64, day: u32, status: RegistryStatus) -> StatusEvent {
    StatusEvent {
        registry_id: RegistryId(registry_id),
        event_time: at(day),
        status,
        identifier: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum RegistryCall {
    Create,
    Update(RegistryId),
    Cancel(RegistryId),
    FetchStatus(RegistryId),
    FetchDecision(RegistryId),
    Upload(RegistryId, String),
    FetchInformationRequest(RegistryId),
}

impl RegistryCall {
    fn is_mutation(&self) -> bool {
        matches!(
            self,
            RegistryCall::Create | RegistryCall::Update(_) | RegistryCall::Cancel(_)
        )
    }
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    calls: Vec<RegistryCall>,
    statuses: HashMap<RegistryId, RegistryStatusSnapshot>,
    decisions: HashMap<RegistryId, Vec<u8>>,
    information_requests: HashMap<RegistryId, InformationRequest>,
    history: Vec<StatusEvent>,
    reject_writes: Option<Vec<String>>,
    status_unreachable: bool,
    history_unreachable: bool,
}

/// Registry fake that records every call and serves configurable statuses.
#[derive(Default)]
pub(super) struct RecordingRegistry {
    state: Mutex<RegistryState>,
}

impl RecordingRegistry {
    fn with_state<T>(&self, f: impl FnOnce(&mut RegistryState) -> T) -> T {
        let mut guard = self.state.lock().expect("registry mutex poisoned");
        f(&mut guard)
    }

    pub(super) fn calls(&self) -> Vec<RegistryCall> {
        self.with_state(|state| state.calls.clone())
    }

    pub(super) fn mutation_calls(&self) -> Vec<RegistryCall> {
        self.calls()
            .into_iter()
            .filter(RegistryCall::is_mutation)
            .collect()
    }

    pub(super) fn set_status(&self, registry_id: RegistryId, status: Option<RegistryStatus>) {
        self.with_state(|state| {
            let snapshot = state
                .statuses
                .entry(registry_id)
                .or_insert(RegistryStatusSnapshot {
                    status: None,
                    identifier: None,
                });
            snapshot.status = status;
        });
    }

    pub(super) fn set_decision(&self, registry_id: RegistryId, bytes: Vec<u8>) {
        self.with_state(|state| {
            state.decisions.insert(registry_id, bytes);
        });
    }

    pub(super) fn set_information_request(&self, request: InformationRequest) {
        self.with_state(|state| {
            state.information_requests.insert(request.registry_id, request);
        });
    }

    pub(super) fn push_history(&self, events: Vec<StatusEvent>) {
        self.with_state(|state| state.history.extend(events));
    }

    pub(super) fn reject_writes(&self, details: &[&str]) {
        self.with_state(|state| {
            state.reject_writes = Some(details.iter().map(|d| d.to_string()).collect());
        });
    }

    pub(super) fn status_unreachable(&self, unreachable: bool) {
        self.with_state(|state| state.status_unreachable = unreachable);
    }

    pub(super) fn history_unreachable(&self, unreachable: bool) {
        self.with_state(|state| state.history_unreachable = unreachable);
    }
}

impl RegistryClient for RecordingRegistry {
    fn create(&self, _data: &ApplicationData) -> Result<RegistryId, RegistryClientError> {
        self.with_state(|state| {
            state.calls.push(RegistryCall::Create);
            if let Some(details) = &state.reject_writes {
                return Err(RegistryClientError::Rejected {
                    details: details.clone(),
                });
            }
            state.next_id += 1;
            let registry_id = RegistryId(1000 + state.next_id);
            state.statuses.insert(
                registry_id,
                RegistryStatusSnapshot {
                    status: Some(RegistryStatus::Pending),
                    identifier: Some(format!("JS24{:05}", state.next_id)),
                },
            );
            Ok(registry_id)
        })
    }

    fn update(
        &self,
        registry_id: RegistryId,
        _data: &ApplicationData,
    ) -> Result<(), RegistryClientError> {
        self.with_state(|state| {
            state.calls.push(RegistryCall::Update(registry_id));
            match &state.reject_writes {
                Some(details) => Err(RegistryClientError::Rejected {
                    details: details.clone(),
                }),
                None => Ok(()),
            }
        })
    }

    fn cancel(&self, registry_id: RegistryId) -> Result<(), RegistryClientError> {
        self.with_state(|state| {
            state.calls.push(RegistryCall::Cancel(registry_id));
            Ok(())
        })
    }

    fn fetch_status(
        &self,
        registry_id: RegistryId,
    ) -> Result<RegistryStatusSnapshot, RegistryClientError> {
        self.with_state(|state| {
            state.calls.push(RegistryCall::FetchStatus(registry_id));
            if state.status_unreachable {
                return Err(RegistryClientError::Unreachable("timeout".to_string()));
            }
            Ok(state
                .statuses
                .get(&registry_id)
                .cloned()
                .unwrap_or(RegistryStatusSnapshot {
                    status: None,
                    identifier: None,
                }))
        })
    }

    fn fetch_decision_document(
        &self,
        registry_id: RegistryId,
    ) -> Result<Vec<u8>, RegistryClientError> {
        self.with_state(|state| {
            state.calls.push(RegistryCall::FetchDecision(registry_id));
            state
                .decisions
                .get(&registry_id)
                .cloned()
                .ok_or(RegistryClientError::DecisionNotFound)
        })
    }

    fn upload_attachment(
        &self,
        registry_id: RegistryId,
        attachment: &ApplicationAttachment,
    ) -> Result<(), RegistryClientError> {
        self.with_state(|state| {
            state
                .calls
                .push(RegistryCall::Upload(registry_id, attachment.id.clone()));
            Ok(())
        })
    }

    fn fetch_pending_information_request(
        &self,
        registry_id: RegistryId,
    ) -> Result<Option<InformationRequest>, RegistryClientError> {
        self.with_state(|state| {
            state
                .calls
                .push(RegistryCall::FetchInformationRequest(registry_id));
            Ok(state.information_requests.get(&registry_id).cloned())
        })
    }
}

impl StatusHistorySource for RecordingRegistry {
    fn fetch_status_history(
        &self,
        registry_ids: &[RegistryId],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusEvent>, RegistryClientError> {
        self.with_state(|state| {
            if state.history_unreachable {
                return Err(RegistryClientError::Unreachable("history offline".to_string()));
            }
            Ok(state
                .history
                .iter()
                .filter(|event| registry_ids.contains(&event.registry_id))
                .filter(|event| since.map_or(true, |since| event.event_time > since))
                .cloned()
                .collect())
        })
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditLog for RecordingAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryAttachments {
    unsent: Mutex<HashMap<ApplicationId, Vec<ApplicationAttachment>>>,
    unavailable: Mutex<bool>,
}

impl MemoryAttachments {
    pub(super) fn add(&self, application_id: ApplicationId, attachment: ApplicationAttachment) {
        self.unsent
            .lock()
            .expect("attachment mutex poisoned")
            .entry(application_id)
            .or_default()
            .push(attachment);
    }

    pub(super) fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().expect("attachment mutex poisoned") = unavailable;
    }
}

impl AttachmentSource for MemoryAttachments {
    fn unsent(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ApplicationAttachment>, AttachmentError> {
        if *self.unavailable.lock().expect("attachment mutex poisoned") {
            return Err(AttachmentError::Unavailable(
                "attachment store down".to_string(),
            ));
        }
        Ok(self
            .unsent
            .lock()
            .expect("attachment mutex poisoned")
            .get(&application_id)
            .cloned()
            .unwrap_or_default())
    }

    fn mark_sent(
        &self,
        application_id: ApplicationId,
        attachment_id: &str,
    ) -> Result<(), AttachmentError> {
        if let Some(pending) = self
            .unsent
            .lock()
            .expect("attachment mutex poisoned")
            .get_mut(&application_id)
        {
            pending.retain(|attachment| attachment.id != attachment_id);
        }
        Ok(())
    }
}

pub(super) struct FixedProjects {
    extents: HashMap<ProjectReference, ProjectExtent>,
}

impl FixedProjects {
    pub(super) fn with(extent: ProjectExtent) -> Self {
        let mut extents = HashMap::new();
        extents.insert(extent.reference.clone(), extent);
        Self { extents }
    }
}

impl ProjectDirectory for FixedProjects {
    fn resolve(
        &self,
        reference: &ProjectReference,
    ) -> Result<Option<ProjectExtent>, ProjectLookupError> {
        Ok(self.extents.get(reference).cloned())
    }
}

pub(super) struct Harness {
    pub(super) service: HakemusService<InMemoryApplicationStore, RecordingRegistry>,
    pub(super) store: Arc<InMemoryApplicationStore>,
    pub(super) registry: Arc<RecordingRegistry>,
    pub(super) audit: Arc<RecordingAudit>,
    pub(super) attachments: Arc<MemoryAttachments>,
}

pub(super) fn harness() -> Harness {
    harness_with_project(project_extent())
}

pub(super) fn harness_with_project(extent: ProjectExtent) -> Harness {
    let store = Arc::new(InMemoryApplicationStore::new());
    let registry = Arc::new(RecordingRegistry::default());
    let audit = Arc::new(RecordingAudit::default());
    let attachments = Arc::new(MemoryAttachments::default());
    let collaborators = Collaborators {
        projects: Arc::new(FixedProjects::with(extent)),
        attachments: attachments.clone(),
        audit: audit.clone(),
    };
    let service = HakemusService::new(store.clone(), registry.clone(), collaborators);
    Harness {
        service,
        store,
        registry,
        audit,
        attachments,
    }
}
