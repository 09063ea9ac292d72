//! Permit application lifecycle and registry synchronization.
//!
//! `service` owns the state machine for create, update, submit and delete; `history` folds
//! the registry's asynchronous status feed back into the same store.

pub mod collaborators;
pub mod domain;
pub mod geometry;
pub mod history;
pub mod registry;
pub mod repository;
pub mod service;
pub mod state;
pub mod validation;

#[cfg(test)]
mod tests;

pub use collaborators::{
    AttachmentError, AttachmentSource, AuditAction, AuditEntry, AuditError, AuditLog,
    ProjectDirectory, ProjectExtent, ProjectLookupError,
};
pub use domain::{
    ApplicationAttachment, ApplicationData, ApplicationId, ApplicationType, CableReportArea,
    CableReportData, Contact, Customer, CustomerType, CustomerWithContacts, ExcavationArea,
    ExcavationNotificationData, ProjectReference, RegistryId, RegistryStatus, StatusEvent,
    UserId,
};
pub use geometry::{Coordinate, Polygon};
pub use history::{fold_latest, HistoryProcessor, HistorySummary, HistoryUpdateError, HistoryUpdater};
pub use registry::{
    InformationRequest, RegistryClient, RegistryClientError, RegistryStatusSnapshot,
    StatusHistorySource,
};
pub use repository::{
    ApplicationRecord, ApplicationRepository, CheckpointRepository, InMemoryApplicationStore,
    RepositoryError, SyncCheckpoint,
};
pub use service::{Collaborators, DecisionDocument, HakemusService, HakemusServiceError};
pub use state::ApplicationState;
pub use validation::{
    validate_for_submission, validate_structural, ValidationError, ValidationRule, Violation,
};
