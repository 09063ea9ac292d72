use serde::Serialize;

use super::domain::{RegistryId, RegistryStatus};

/// Where an application sits relative to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    /// Never accepted by the registry.
    Draft,
    /// Known to the registry but still editable by the applicant.
    ClientPending,
    /// Sent for processing; the registry has not picked it up yet.
    RegistryPending,
    /// The registry owns the record; local mutation is forbidden.
    RegistryActive,
}

impl ApplicationState {
    pub fn classify(
        registry_id: Option<RegistryId>,
        status: Option<RegistryStatus>,
        pending_on_client: bool,
    ) -> Self {
        if registry_id.is_none() {
            return ApplicationState::Draft;
        }
        if !status.map_or(true, RegistryStatus::is_early) {
            return ApplicationState::RegistryActive;
        }
        if pending_on_client {
            ApplicationState::ClientPending
        } else {
            ApplicationState::RegistryPending
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationState::Draft => "draft",
            ApplicationState::ClientPending => "client_pending",
            ApplicationState::RegistryPending => "registry_pending",
            ApplicationState::RegistryActive => "registry_active",
        }
    }

    pub const fn is_locked(self) -> bool {
        matches!(self, ApplicationState::RegistryActive)
    }
}
