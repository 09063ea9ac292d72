use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geometry::Polygon;

/// Local identity of an application, assigned by the store at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity the registry assigned when it accepted the first submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryId(pub u64);

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the owning project ("hanketunnus").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectReference(pub String);

impl fmt::Display for ProjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationType {
    CableReport,
    ExcavationNotification,
}

impl ApplicationType {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationType::CableReport => "cable_report",
            ApplicationType::ExcavationNotification => "excavation_notification",
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status vocabulary of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryStatus {
    PendingClient,
    PreReserved,
    Pending,
    WaitingInformation,
    InformationReceived,
    Handling,
    ReturnedToPreparation,
    WaitingContractApproval,
    #[serde(rename = "DECISIONMAKING")]
    DecisionMaking,
    Decision,
    Approved,
    Rejected,
    OperationalCondition,
    Finished,
    Cancelled,
    Replaced,
    Archived,
}

impl RegistryStatus {
    /// Statuses in which the registry has not started processing yet.
    pub const fn is_early(self) -> bool {
        matches!(self, RegistryStatus::PendingClient | RegistryStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    Person,
    Company,
    Association,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "type")]
    pub customer_type: Option<CustomerType>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub registry_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub orderer: bool,
}

/// A customer together with the people acting on its behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerWithContacts {
    pub customer: Customer,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CableReportArea {
    pub name: String,
    pub geometry: Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcavationArea {
    pub name: String,
    pub street_address: String,
    #[serde(default)]
    pub work_areas: Vec<Polygon>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CableReportData {
    pub name: Option<String>,
    pub work_description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub rock_excavation: Option<bool>,
    #[serde(default)]
    pub construction_work: bool,
    #[serde(default)]
    pub maintenance_work: bool,
    #[serde(default)]
    pub emergency_work: bool,
    #[serde(default)]
    pub property_connectivity: bool,
    pub areas: Option<Vec<CableReportArea>>,
    pub customer_with_contacts: Option<CustomerWithContacts>,
    pub contractor_with_contacts: Option<CustomerWithContacts>,
    pub representative_with_contacts: Option<CustomerWithContacts>,
    pub property_developer_with_contacts: Option<CustomerWithContacts>,
    #[serde(default)]
    pub pending_on_client: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcavationNotificationData {
    pub name: Option<String>,
    pub work_description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub rock_excavation: Option<bool>,
    #[serde(default)]
    pub construction_work: bool,
    #[serde(default)]
    pub maintenance_work: bool,
    #[serde(default)]
    pub emergency_work: bool,
    #[serde(default)]
    pub cable_report_done: bool,
    #[serde(default)]
    pub cable_reports: Vec<String>,
    #[serde(default)]
    pub required_competence: bool,
    pub additional_info: Option<String>,
    pub areas: Option<Vec<ExcavationArea>>,
    pub customer_with_contacts: Option<CustomerWithContacts>,
    pub contractor_with_contacts: Option<CustomerWithContacts>,
    pub representative_with_contacts: Option<CustomerWithContacts>,
    pub property_developer_with_contacts: Option<CustomerWithContacts>,
    #[serde(default)]
    pub pending_on_client: bool,
}

/// Type-specific payload of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "applicationType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationData {
    CableReport(CableReportData),
    ExcavationNotification(ExcavationNotificationData),
}

impl ApplicationData {
    pub fn application_type(&self) -> ApplicationType {
        match self {
            ApplicationData::CableReport(_) => ApplicationType::CableReport,
            ApplicationData::ExcavationNotification(_) => ApplicationType::ExcavationNotification,
        }
    }

    pub fn pending_on_client(&self) -> bool {
        match self {
            ApplicationData::CableReport(data) => data.pending_on_client,
            ApplicationData::ExcavationNotification(data) => data.pending_on_client,
        }
    }

    pub fn set_pending_on_client(&mut self, pending_on_client: bool) {
        match self {
            ApplicationData::CableReport(data) => data.pending_on_client = pending_on_client,
            ApplicationData::ExcavationNotification(data) => {
                data.pending_on_client = pending_on_client
            }
        }
    }

    pub fn with_pending_on_client(mut self, pending_on_client: bool) -> Self {
        self.set_pending_on_client(pending_on_client);
        self
    }

    /// Every polygon in the payload, paired with its field path.
    pub fn geometries(&self) -> Vec<(String, &Polygon)> {
        match self {
            ApplicationData::CableReport(data) => data
                .areas
                .iter()
                .flatten()
                .enumerate()
                .map(|(i, area)| (format!("areas[{i}].geometry"), &area.geometry))
                .collect(),
            ApplicationData::ExcavationNotification(data) => data
                .areas
                .iter()
                .flatten()
                .enumerate()
                .flat_map(|(i, area)| {
                    area.work_areas
                        .iter()
                        .enumerate()
                        .map(move |(j, polygon)| (format!("areas[{i}].workAreas[{j}]"), polygon))
                })
                .collect(),
        }
    }

    /// The contact groups that are present, keyed by field name.
    pub fn contact_groups(&self) -> Vec<(&'static str, &CustomerWithContacts)> {
        match self {
            ApplicationData::CableReport(data) => data.contact_groups(),
            ApplicationData::ExcavationNotification(data) => data.contact_groups(),
        }
    }
}

impl CableReportData {
    pub fn contact_groups(&self) -> Vec<(&'static str, &CustomerWithContacts)> {
        present_groups([
            self.customer_with_contacts.as_ref(),
            self.contractor_with_contacts.as_ref(),
            self.representative_with_contacts.as_ref(),
            self.property_developer_with_contacts.as_ref(),
        ])
    }
}

impl ExcavationNotificationData {
    pub fn contact_groups(&self) -> Vec<(&'static str, &CustomerWithContacts)> {
        present_groups([
            self.customer_with_contacts.as_ref(),
            self.contractor_with_contacts.as_ref(),
            self.representative_with_contacts.as_ref(),
            self.property_developer_with_contacts.as_ref(),
        ])
    }
}

const CONTACT_GROUP_PATHS: [&str; 4] = [
    "customerWithContacts",
    "contractorWithContacts",
    "representativeWithContacts",
    "propertyDeveloperWithContacts",
];

fn present_groups(
    groups: [Option<&CustomerWithContacts>; 4],
) -> Vec<(&'static str, &CustomerWithContacts)> {
    CONTACT_GROUP_PATHS
        .into_iter()
        .zip(groups)
        .filter_map(|(path, group)| group.map(|group| (path, group)))
        .collect()
}

/// File waiting to be sent to the registry alongside an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationAttachment {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// One remote status change, as reported by the registry's history feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub registry_id: RegistryId,
    pub event_time: DateTime<Utc>,
    pub status: RegistryStatus,
    #[serde(default)]
    pub identifier: Option<String>,
}
