//! Two-tier payload validation.
//!
//! Structural checks run on every create and update and stop at the first broken geometry.
//! Submission checks run only when a payload is about to reach the registry and collect
//! every violation before failing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::collaborators::ProjectExtent;
use super::domain::{
    ApplicationData, CableReportData, CustomerWithContacts, ExcavationNotificationData,
};
use super::geometry::Coordinate;

/// Rule a field failed during submission validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    Required,
    NotBlank,
    NotEmpty,
    AtMostOneOrderer,
    EndBeforeStart,
    InvalidFormat,
    MustBeConfirmed,
    WorkTypeRequired,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValidationRule::Required => "is required",
            ValidationRule::NotBlank => "must not be blank",
            ValidationRule::NotEmpty => "must not be empty",
            ValidationRule::AtMostOneOrderer => "allows at most one orderer",
            ValidationRule::EndBeforeStart => "must not precede the start time",
            ValidationRule::InvalidFormat => "has an invalid format",
            ValidationRule::MustBeConfirmed => "must be confirmed",
            ValidationRule::WorkTypeRequired => "or another work type must be selected",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field_path: String,
    pub rule: ValidationRule,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field_path, self.rule)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid geometry at {path}: {reason}{}", describe_point(.offending_point))]
    GeometryInvalid {
        path: String,
        reason: String,
        offending_point: Option<Coordinate>,
    },
    #[error("application is not ready for submission: {}", join_violations(.violations))]
    SubmissionDataInvalid { violations: Vec<Violation> },
}

fn describe_point(point: &Option<Coordinate>) -> String {
    point
        .map(|point| format!(" at {point}"))
        .unwrap_or_default()
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Geometry checks that apply to drafts as well as submitted applications.
pub fn validate_structural(
    data: &ApplicationData,
    project: &ProjectExtent,
) -> Result<(), ValidationError> {
    for (path, polygon) in data.geometries() {
        if let Some(defect) = polygon.simplicity_defect() {
            return Err(ValidationError::GeometryInvalid {
                path,
                reason: defect.reason,
                offending_point: defect.offending_point,
            });
        }

        if project.requires_area_containment
            && !project.areas.iter().any(|area| polygon.intersects(area))
        {
            return Err(ValidationError::GeometryInvalid {
                path,
                reason: format!("area is outside project {}", project.reference),
                offending_point: polygon.first_point(),
            });
        }
    }

    Ok(())
}

/// Completeness checks required before the registry may see the payload.
pub fn validate_for_submission(data: &ApplicationData) -> Result<(), ValidationError> {
    let mut report = ViolationReport::default();
    data.rules().collect_violations(&mut report);
    report.into_result()
}

/// Capability shared by every payload variant.
pub trait SubmissionRules {
    fn collect_violations(&self, report: &mut ViolationReport);
}

impl ApplicationData {
    pub fn rules(&self) -> &dyn SubmissionRules {
        match self {
            ApplicationData::CableReport(data) => data as &dyn SubmissionRules,
            ApplicationData::ExcavationNotification(data) => data as &dyn SubmissionRules,
        }
    }
}

/// Accumulates violations in field order.
#[derive(Debug, Default)]
pub struct ViolationReport {
    violations: Vec<Violation>,
}

impl ViolationReport {
    pub fn push(&mut self, field_path: impl Into<String>, rule: ValidationRule) {
        self.violations.push(Violation {
            field_path: field_path.into(),
            rule,
        });
    }

    pub fn check(&mut self, holds: bool, field_path: impl Into<String>, rule: ValidationRule) {
        if !holds {
            self.push(field_path, rule);
        }
    }

    pub fn not_blank(&mut self, value: Option<&str>, field_path: &str) {
        match value {
            None => self.push(field_path, ValidationRule::Required),
            Some(text) if text.trim().is_empty() => self.push(field_path, ValidationRule::NotBlank),
            Some(_) => {}
        }
    }

    pub fn present<T>(&mut self, value: &Option<T>, field_path: &str) {
        self.check(value.is_some(), field_path, ValidationRule::Required);
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::SubmissionDataInvalid {
                violations: self.violations,
            })
        }
    }
}

struct SharedFields<'a> {
    name: Option<&'a str>,
    work_description: Option<&'a str>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    rock_excavation: Option<bool>,
    groups: Vec<(&'static str, &'a CustomerWithContacts)>,
}

fn collect_shared(fields: SharedFields<'_>, report: &mut ViolationReport) {
    report.not_blank(fields.name, "name");
    report.not_blank(fields.work_description, "workDescription");
    report.present(&fields.start_time, "startTime");
    report.present(&fields.end_time, "endTime");
    if let (Some(start), Some(end)) = (fields.start_time, fields.end_time) {
        report.check(end >= start, "endTime", ValidationRule::EndBeforeStart);
    }
    report.present(&fields.rock_excavation, "rockExcavation");

    let orderers = fields
        .groups
        .iter()
        .flat_map(|(_, group)| group.contacts.iter())
        .filter(|contact| contact.orderer)
        .count();
    report.check(
        orderers <= 1,
        "customersWithContacts[].contacts[].orderer",
        ValidationRule::AtMostOneOrderer,
    );

    for (path, group) in fields.groups {
        collect_contact_group(group, path, report);
    }
}

fn collect_contact_group(group: &CustomerWithContacts, path: &str, report: &mut ViolationReport) {
    report.present(&group.customer.customer_type, &format!("{path}.customer.type"));
    report.not_blank(Some(group.customer.name.as_str()), &format!("{path}.customer.name"));
    for (i, contact) in group.contacts.iter().enumerate() {
        let contact_path = format!("{path}.contacts[{i}]");
        report.not_blank(
            Some(contact.first_name.as_str()),
            &format!("{contact_path}.firstName"),
        );
        report.not_blank(Some(contact.last_name.as_str()), &format!("{contact_path}.lastName"));
        report.not_blank(Some(contact.email.as_str()), &format!("{contact_path}.email"));
    }
}

impl SubmissionRules for CableReportData {
    fn collect_violations(&self, report: &mut ViolationReport) {
        collect_shared(
            SharedFields {
                name: self.name.as_deref(),
                work_description: self.work_description.as_deref(),
                start_time: self.start_time,
                end_time: self.end_time,
                rock_excavation: self.rock_excavation,
                groups: self.contact_groups(),
            },
            report,
        );

        match &self.areas {
            None => report.push("areas", ValidationRule::Required),
            Some(areas) => report.check(!areas.is_empty(), "areas", ValidationRule::NotEmpty),
        }
    }
}

impl SubmissionRules for ExcavationNotificationData {
    fn collect_violations(&self, report: &mut ViolationReport) {
        collect_shared(
            SharedFields {
                name: self.name.as_deref(),
                work_description: self.work_description.as_deref(),
                start_time: self.start_time,
                end_time: self.end_time,
                rock_excavation: self.rock_excavation,
                groups: self.contact_groups(),
            },
            report,
        );

        if !(self.construction_work || self.maintenance_work || self.emergency_work) {
            for path in ["constructionWork", "maintenanceWork", "emergencyWork"] {
                report.push(path, ValidationRule::WorkTypeRequired);
            }
        }
        for (path, group) in [
            ("customerWithContacts", &self.customer_with_contacts),
            ("contractorWithContacts", &self.contractor_with_contacts),
        ] {
            match group {
                None => report.push(path, ValidationRule::Required),
                Some(group) => report.check(
                    !group.contacts.is_empty(),
                    format!("{path}.contacts"),
                    ValidationRule::NotEmpty,
                ),
            }
        }

        if self.cable_report_done {
            report.check(
                !self.cable_reports.is_empty(),
                "cableReports",
                ValidationRule::NotEmpty,
            );
        }
        for (i, identifier) in self.cable_reports.iter().enumerate() {
            report.check(
                is_cable_report_identifier(identifier),
                format!("cableReports[{i}]"),
                ValidationRule::InvalidFormat,
            );
        }
        report.check(
            self.required_competence,
            "requiredCompetence",
            ValidationRule::MustBeConfirmed,
        );
        if let Some(info) = &self.additional_info {
            report.check(
                !info.trim().is_empty(),
                "additionalInfo",
                ValidationRule::NotBlank,
            );
        }

        match &self.areas {
            None => report.push("areas", ValidationRule::Required),
            Some(areas) if areas.is_empty() => report.push("areas", ValidationRule::NotEmpty),
            Some(areas) => {
                for (i, area) in areas.iter().enumerate() {
                    report.not_blank(
                        Some(area.street_address.as_str()),
                        &format!("areas[{i}].streetAddress"),
                    );
                    report.check(
                        !area.work_areas.is_empty(),
                        format!("areas[{i}].workAreas"),
                        ValidationRule::NotEmpty,
                    );
                }
            }
        }
    }
}

/// Cable report identifiers look like `JS2400001`.
fn is_cable_report_identifier(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 9
        && bytes[..2].eq_ignore_ascii_case(b"JS")
        && bytes[2..].iter().all(u8::is_ascii_digit)
}
