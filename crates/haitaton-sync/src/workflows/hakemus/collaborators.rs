//! Ports to systems that own data this engine only consumes or reports to.

use serde::{Deserialize, Serialize};

use super::domain::{ApplicationAttachment, ApplicationId, ProjectReference, UserId};
use super::geometry::Polygon;
use super::repository::ApplicationRecord;

/// Spatial extent of the project an application belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectExtent {
    pub reference: ProjectReference,
    pub areas: Vec<Polygon>,
    pub requires_area_containment: bool,
}

pub trait ProjectDirectory: Send + Sync {
    fn resolve(
        &self,
        reference: &ProjectReference,
    ) -> Result<Option<ProjectExtent>, ProjectLookupError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectLookupError {
    #[error("project directory unavailable: {0}")]
    Unavailable(String),
}

/// Attachment bytes are stored elsewhere; this port hands over the ones the registry lacks.
pub trait AttachmentSource: Send + Sync {
    fn unsent(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ApplicationAttachment>, AttachmentError>;
    fn mark_sent(
        &self,
        application_id: ApplicationId,
        attachment_id: &str,
    ) -> Result<(), AttachmentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub application_id: ApplicationId,
    pub actor: UserId,
    pub before: Option<ApplicationRecord>,
    pub after: Option<ApplicationRecord>,
}

pub trait AuditLog: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}
