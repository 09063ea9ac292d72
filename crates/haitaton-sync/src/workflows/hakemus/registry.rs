//! Port to the external permitting registry. Implementations live outside this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationAttachment, ApplicationData, RegistryId, RegistryStatus, StatusEvent};

/// Current remote state of an application.
///
/// `status` is absent while the registry keeps the application in its client-pending meta
/// state, where it reports no status at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatusSnapshot {
    pub status: Option<RegistryStatus>,
    pub identifier: Option<String>,
}

/// Supplementary information the registry has asked the applicant for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationRequest {
    pub request_id: u64,
    pub registry_id: RegistryId,
    pub requested_fields: Vec<String>,
    pub requested_at: DateTime<Utc>,
}

pub trait RegistryClient: Send + Sync {
    fn create(&self, data: &ApplicationData) -> Result<RegistryId, RegistryClientError>;
    fn update(&self, registry_id: RegistryId, data: &ApplicationData)
        -> Result<(), RegistryClientError>;
    fn cancel(&self, registry_id: RegistryId) -> Result<(), RegistryClientError>;
    fn fetch_status(
        &self,
        registry_id: RegistryId,
    ) -> Result<RegistryStatusSnapshot, RegistryClientError>;
    fn fetch_decision_document(&self, registry_id: RegistryId)
        -> Result<Vec<u8>, RegistryClientError>;
    fn upload_attachment(
        &self,
        registry_id: RegistryId,
        attachment: &ApplicationAttachment,
    ) -> Result<(), RegistryClientError>;
    fn fetch_pending_information_request(
        &self,
        registry_id: RegistryId,
    ) -> Result<Option<InformationRequest>, RegistryClientError>;
}

/// Feed of remote status changes used by the scheduled history ingestion.
pub trait StatusHistorySource: Send + Sync {
    /// Events for `registry_ids` that happened after `since` (all history when `None`).
    fn fetch_status_history(
        &self,
        registry_ids: &[RegistryId],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusEvent>, RegistryClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryClientError {
    #[error("registry rejected the request: {}", .details.join("; "))]
    Rejected { details: Vec<String> },
    #[error("registry unreachable: {0}")]
    Unreachable(String),
    #[error("registry has no decision document for the application")]
    DecisionNotFound,
}
