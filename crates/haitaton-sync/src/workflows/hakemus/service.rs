use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::collaborators::{
    AttachmentError, AttachmentSource, AuditAction, AuditEntry, AuditError, AuditLog,
    ProjectDirectory, ProjectExtent, ProjectLookupError,
};
use super::domain::{
    ApplicationData, ApplicationId, ApplicationType, ProjectReference, RegistryId, UserId,
};
use super::geometry::Coordinate;
use super::registry::{
    InformationRequest, RegistryClient, RegistryClientError, RegistryStatusSnapshot,
};
use super::repository::{ApplicationRecord, ApplicationRepository, RepositoryError};
use super::state::ApplicationState;
use super::validation::{validate_for_submission, validate_structural, ValidationError, Violation};
use crate::config::DEFAULT_DECISION_FALLBACK_NAME;

/// External collaborators the engine reports to or reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub projects: Arc<dyn ProjectDirectory>,
    pub attachments: Arc<dyn AttachmentSource>,
    pub audit: Arc<dyn AuditLog>,
}

/// Decision document ready to hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Synchronization engine: drives the application state machine against the registry.
///
/// Local state is persisted only after the matching registry call has succeeded. The one
/// exception is the registry id returned by `create`, which is saved at once so a retried
/// submit can never create the same application twice.
pub struct HakemusService<R, C> {
    repository: Arc<R>,
    registry: Arc<C>,
    collaborators: Collaborators,
    decision_fallback_name: String,
}

impl<R, C> HakemusService<R, C>
where
    R: ApplicationRepository + 'static,
    C: RegistryClient + 'static,
{
    pub fn new(repository: Arc<R>, registry: Arc<C>, collaborators: Collaborators) -> Self {
        Self {
            repository,
            registry,
            collaborators,
            decision_fallback_name: DEFAULT_DECISION_FALLBACK_NAME.to_string(),
        }
    }

    pub fn with_decision_fallback_name(mut self, name: impl Into<String>) -> Self {
        self.decision_fallback_name = name.into();
        self
    }

    /// Store a new local draft. Nothing is sent to the registry.
    pub fn create(
        &self,
        data: ApplicationData,
        project: &ProjectReference,
        user: &UserId,
    ) -> Result<ApplicationRecord, HakemusServiceError> {
        let extent = self.resolve_project(project)?;
        let data = data.with_pending_on_client(true);
        validate_structural(&data, &extent)?;

        let record = ApplicationRecord {
            id: self.repository.next_id()?,
            registry_id: None,
            registry_identifier: None,
            registry_status: None,
            application_type: data.application_type(),
            data,
            project: project.clone(),
            created_by: user.clone(),
            created_at: Utc::now(),
            modified_at: None,
        };

        let saved = self.repository.save(record)?;
        info!(
            application_id = %saved.id,
            application_type = saved.application_type.label(),
            project = %saved.project,
            "created application draft"
        );
        self.audit(AuditAction::Create, saved.id, user, None, Some(saved.clone()))?;
        Ok(saved)
    }

    /// Replace the payload of an application that is still editable.
    pub fn update_data(
        &self,
        id: ApplicationId,
        data: ApplicationData,
        user: &UserId,
    ) -> Result<ApplicationRecord, HakemusServiceError> {
        let record = self.load(id)?;
        if data.application_type() != record.application_type {
            return Err(HakemusServiceError::IncompatibleType {
                id,
                expected: record.application_type,
                found: data.application_type(),
            });
        }

        let extent = self.resolve_project(&record.project)?;
        validate_structural(&data, &extent)?;

        let Some(registry_id) = record.registry_id else {
            let data = data.with_pending_on_client(true);
            if data == record.data {
                debug!(application_id = %id, "draft unchanged, skipping update");
                return Ok(record);
            }
            let mut updated = record.clone();
            updated.data = data;
            updated.modified_at = Some(Utc::now());
            let saved = self.repository.save(updated)?;
            self.audit(AuditAction::Update, id, user, Some(record), Some(saved.clone()))?;
            return Ok(saved);
        };

        let snapshot = self.current_status(registry_id)?;
        let state = ApplicationState::classify(
            Some(registry_id),
            snapshot.status,
            record.data.pending_on_client(),
        );
        if state.is_locked() {
            return Err(HakemusServiceError::AlreadyProcessing { id, registry_id });
        }

        let data = data.with_pending_on_client(record.data.pending_on_client());
        if data == record.data {
            debug!(application_id = %id, %registry_id, "payload unchanged, skipping registry update");
            return Ok(record);
        }

        validate_for_submission(&data)?;

        info!(application_id = %id, %registry_id, "updating application in registry");
        self.registry
            .update(registry_id, &data)
            .map_err(HakemusServiceError::from_registry)?;
        self.upload_attachments(id, registry_id)?;

        let mut updated = record.clone();
        updated.data = data;
        updated.registry_status = snapshot.status;
        if snapshot.identifier.is_some() {
            updated.registry_identifier = snapshot.identifier;
        }
        updated.modified_at = Some(Utc::now());
        let saved = self.repository.save(updated)?;
        self.audit(AuditAction::Update, id, user, Some(record), Some(saved.clone()))?;
        Ok(saved)
    }

    /// Hand the application over to the registry for processing.
    ///
    /// Safe to retry: once the registry holds a non-client-pending copy this is a no-op.
    pub fn submit(
        &self,
        id: ApplicationId,
        user: &UserId,
    ) -> Result<ApplicationRecord, HakemusServiceError> {
        let mut record = self.load(id)?;
        let before = record.clone();

        if let Some(registry_id) = record.registry_id {
            let snapshot = self.current_status(registry_id)?;
            let state = ApplicationState::classify(
                Some(registry_id),
                snapshot.status,
                record.data.pending_on_client(),
            );
            match state {
                ApplicationState::RegistryActive | ApplicationState::RegistryPending => {
                    debug!(
                        application_id = %id,
                        %registry_id,
                        state = state.label(),
                        "application already submitted"
                    );
                    return Ok(record);
                }
                ApplicationState::Draft | ApplicationState::ClientPending => {}
            }
        }

        let data = record.data.clone().with_pending_on_client(false);
        validate_for_submission(&data)?;

        let registry_id = match record.registry_id {
            Some(registry_id) => {
                info!(application_id = %id, %registry_id, "sending application update to registry");
                self.registry
                    .update(registry_id, &data)
                    .map_err(HakemusServiceError::from_registry)?;
                registry_id
            }
            None => {
                info!(application_id = %id, "creating application in registry");
                let registry_id = self
                    .registry
                    .create(&data)
                    .map_err(HakemusServiceError::from_registry)?;
                record.registry_id = Some(registry_id);
                record = self.repository.save(record)?;
                info!(application_id = %id, %registry_id, "registry id captured");
                registry_id
            }
        };

        self.upload_attachments(id, registry_id)?;

        match self.registry.fetch_status(registry_id) {
            Ok(snapshot) => {
                record.registry_status = snapshot.status;
                record.registry_identifier = snapshot.identifier.or(record.registry_identifier.take());
            }
            Err(err) => {
                warn!(
                    application_id = %id,
                    %registry_id,
                    error = %err,
                    "status query after submission failed, leaving status for history ingestion"
                );
            }
        }

        record.data = data;
        record.modified_at = Some(Utc::now());
        let saved = self.repository.save(record)?;
        self.audit(AuditAction::Update, id, user, Some(before), Some(saved.clone()))?;
        Ok(saved)
    }

    /// Remove an application, cancelling it in the registry when it was already sent.
    pub fn delete(&self, id: ApplicationId, user: &UserId) -> Result<(), HakemusServiceError> {
        let record = self.load(id)?;

        if let Some(registry_id) = record.registry_id {
            let snapshot = self.current_status(registry_id)?;
            let state = ApplicationState::classify(
                Some(registry_id),
                snapshot.status,
                record.data.pending_on_client(),
            );
            if state.is_locked() {
                return Err(HakemusServiceError::AlreadyProcessing { id, registry_id });
            }
            info!(application_id = %id, %registry_id, "cancelling application in registry");
            self.registry
                .cancel(registry_id)
                .map_err(HakemusServiceError::from_registry)?;
        }

        self.repository.delete(id)?;
        info!(application_id = %id, "deleted application");
        self.audit(AuditAction::Delete, id, user, Some(record), None)?;
        Ok(())
    }

    pub fn fetch_decision_document(
        &self,
        id: ApplicationId,
    ) -> Result<DecisionDocument, HakemusServiceError> {
        let record = self.load(id)?;
        let registry_id = record
            .registry_id
            .ok_or(HakemusServiceError::DecisionNotFound { id })?;

        let bytes = self
            .registry
            .fetch_decision_document(registry_id)
            .map_err(|err| match err {
                RegistryClientError::DecisionNotFound => {
                    HakemusServiceError::DecisionNotFound { id }
                }
                other => HakemusServiceError::from_registry(other),
            })?;

        let filename = record
            .registry_identifier
            .unwrap_or_else(|| self.decision_fallback_name.clone());
        Ok(DecisionDocument { filename, bytes })
    }

    /// Outstanding information request from the registry, if the application was sent.
    pub fn pending_information_request(
        &self,
        id: ApplicationId,
    ) -> Result<Option<InformationRequest>, HakemusServiceError> {
        let record = self.load(id)?;
        match record.registry_id {
            None => Ok(None),
            Some(registry_id) => self
                .registry
                .fetch_pending_information_request(registry_id)
                .map_err(HakemusServiceError::from_registry),
        }
    }

    pub fn list_for_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<ApplicationRecord>, HakemusServiceError> {
        let mut records = self.repository.list_by_user(user)?;
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    pub fn get_by_id(&self, id: ApplicationId) -> Result<ApplicationRecord, HakemusServiceError> {
        self.load(id)
    }

    fn load(&self, id: ApplicationId) -> Result<ApplicationRecord, HakemusServiceError> {
        self.repository.find_by_id(id).map_err(|err| match err {
            RepositoryError::NotFound => HakemusServiceError::NotFound { id },
            other => HakemusServiceError::Repository(other),
        })
    }

    fn resolve_project(
        &self,
        reference: &ProjectReference,
    ) -> Result<ProjectExtent, HakemusServiceError> {
        self.collaborators
            .projects
            .resolve(reference)?
            .ok_or_else(|| HakemusServiceError::ProjectNotFound {
                reference: reference.clone(),
            })
    }

    fn current_status(
        &self,
        registry_id: RegistryId,
    ) -> Result<RegistryStatusSnapshot, HakemusServiceError> {
        self.registry
            .fetch_status(registry_id)
            .map_err(HakemusServiceError::from_registry)
    }

    fn upload_attachments(
        &self,
        id: ApplicationId,
        registry_id: RegistryId,
    ) -> Result<(), HakemusServiceError> {
        let attachments = self.collaborators.attachments.unsent(id)?;
        for attachment in &attachments {
            self.registry
                .upload_attachment(registry_id, attachment)
                .map_err(HakemusServiceError::from_registry)?;
            self.collaborators.attachments.mark_sent(id, &attachment.id)?;
        }
        if !attachments.is_empty() {
            info!(
                application_id = %id,
                %registry_id,
                count = attachments.len(),
                "uploaded attachments"
            );
        }
        Ok(())
    }

    fn audit(
        &self,
        action: AuditAction,
        application_id: ApplicationId,
        actor: &UserId,
        before: Option<ApplicationRecord>,
        after: Option<ApplicationRecord>,
    ) -> Result<(), HakemusServiceError> {
        self.collaborators.audit.record(AuditEntry {
            action,
            application_id,
            actor: actor.clone(),
            before,
            after,
        })?;
        Ok(())
    }
}

/// Error raised by the synchronization engine.
#[derive(Debug, thiserror::Error)]
pub enum HakemusServiceError {
    #[error("application {id} not found")]
    NotFound { id: ApplicationId },
    #[error("application {id} is already being processed by the registry (registry id {registry_id})")]
    AlreadyProcessing {
        id: ApplicationId,
        registry_id: RegistryId,
    },
    #[error("invalid geometry at {path}: {reason}")]
    GeometryInvalid {
        path: String,
        reason: String,
        offending_point: Option<Coordinate>,
    },
    #[error("application is not ready for submission ({} violations)", .violations.len())]
    SubmissionDataInvalid { violations: Vec<Violation> },
    #[error("no decision document for application {id}")]
    DecisionNotFound { id: ApplicationId },
    #[error("registry rejected the request: {}", .details.join("; "))]
    Registry { details: Vec<String> },
    #[error("registry unreachable: {0}")]
    RegistryUnreachable(String),
    #[error("project {reference} not found")]
    ProjectNotFound { reference: ProjectReference },
    #[error("application {id} is a {expected} and cannot take a {found} payload")]
    IncompatibleType {
        id: ApplicationId,
        expected: ApplicationType,
        found: ApplicationType,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    ProjectLookup(#[from] ProjectLookupError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl HakemusServiceError {
    fn from_registry(err: RegistryClientError) -> Self {
        match err {
            RegistryClientError::Rejected { details } => Self::Registry { details },
            RegistryClientError::Unreachable(reason) => Self::RegistryUnreachable(reason),
            RegistryClientError::DecisionNotFound => Self::Registry {
                details: vec![RegistryClientError::DecisionNotFound.to_string()],
            },
        }
    }

    /// Field paths of a submission failure, empty for every other error.
    pub fn violated_fields(&self) -> Vec<&str> {
        match self {
            Self::SubmissionDataInvalid { violations } => violations
                .iter()
                .map(|violation| violation.field_path.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<ValidationError> for HakemusServiceError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::GeometryInvalid {
                path,
                reason,
                offending_point,
            } => Self::GeometryInvalid {
                path,
                reason,
                offending_point,
            },
            ValidationError::SubmissionDataInvalid { violations } => {
                Self::SubmissionDataInvalid { violations }
            }
        }
    }
}
