use crate::infra::{InMemoryRegistry, NoAttachments, StaticProjectDirectory, TracingAuditLog};
use chrono::{Duration, Utc};
use clap::Args;
use haitaton_sync::config::SyncConfig;
use haitaton_sync::error::AppError;
use haitaton_sync::workflows::hakemus::{
    ApplicationData, CableReportArea, CableReportData, Collaborators, Contact, Customer,
    CustomerType, CustomerWithContacts, HakemusService, HakemusServiceError, HistoryProcessor,
    InMemoryApplicationStore, Polygon, ProjectExtent, ProjectReference, RegistryClientError,
    RegistryStatus, StatusEvent, UserId,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Stop after submission instead of replaying registry history.
    #[arg(long)]
    pub(crate) skip_history: bool,
}

fn demo_project() -> ProjectExtent {
    ProjectExtent {
        reference: ProjectReference("HAI24-DEMO".to_string()),
        areas: vec![Polygon::from_points(&[
            (25_496_000.0, 6_672_000.0),
            (25_497_000.0, 6_672_000.0),
            (25_497_000.0, 6_673_000.0),
            (25_496_000.0, 6_673_000.0),
        ])],
        requires_area_containment: true,
    }
}

fn demo_group(name: &str, first_name: &str, orderer: bool) -> CustomerWithContacts {
    CustomerWithContacts {
        customer: Customer {
            customer_type: Some(CustomerType::Company),
            name: name.to_string(),
            email: Some(format!("info@{}.example", name.to_lowercase().replace(' ', "-"))),
            phone: None,
            registry_key: None,
        },
        contacts: vec![Contact {
            first_name: first_name.to_string(),
            last_name: "Esimerkki".to_string(),
            email: format!("{}@example.test", first_name.to_lowercase()),
            phone: None,
            orderer,
        }],
    }
}

fn demo_cable_report(area: Polygon) -> ApplicationData {
    let start = Utc::now() + Duration::days(7);
    ApplicationData::CableReport(CableReportData {
        name: Some("Sähköliittymän johtoselvitys".to_string()),
        work_description: Some("Kaapelireitin kaivu tontin rajalle".to_string()),
        start_time: Some(start),
        end_time: Some(start + Duration::days(14)),
        rock_excavation: Some(false),
        construction_work: true,
        maintenance_work: false,
        emergency_work: false,
        property_connectivity: true,
        areas: Some(vec![CableReportArea {
            name: "Liittymäalue".to_string(),
            geometry: area,
        }]),
        customer_with_contacts: Some(demo_group("Verkko Oy", "Aino", true)),
        contractor_with_contacts: Some(demo_group("Kaivu Oy", "Eero", false)),
        representative_with_contacts: None,
        property_developer_with_contacts: None,
        pending_on_client: false,
    })
}

pub(crate) fn run_demo(args: DemoArgs, config: &SyncConfig) -> Result<(), AppError> {
    let project = demo_project();
    let reference = project.reference.clone();
    let user = UserId("demo-user".to_string());

    let store = Arc::new(InMemoryApplicationStore::new());
    let registry = Arc::new(InMemoryRegistry::default());
    let collaborators = Collaborators {
        projects: Arc::new(StaticProjectDirectory::new([project])),
        attachments: Arc::new(NoAttachments),
        audit: Arc::new(TracingAuditLog),
    };
    let service = HakemusService::new(store.clone(), registry.clone(), collaborators)
        .with_decision_fallback_name(config.decision_fallback_name.clone());

    println!("Permit application lifecycle demo");

    let bowtie = Polygon::from_points(&[
        (25_496_100.0, 6_672_100.0),
        (25_496_300.0, 6_672_300.0),
        (25_496_300.0, 6_672_100.0),
        (25_496_100.0, 6_672_300.0),
    ]);
    match service.create(demo_cable_report(bowtie), &reference, &user) {
        Err(HakemusServiceError::GeometryInvalid {
            path,
            reason,
            offending_point,
        }) => {
            let point = offending_point
                .map(|point| point.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("- Rejected draft: {path} {reason} at {point}");
        }
        Err(err) => return Err(err.into()),
        Ok(record) => println!("- Unexpectedly accepted draft {}", record.id),
    }

    let area = Polygon::from_points(&[
        (25_496_400.0, 6_672_400.0),
        (25_496_450.0, 6_672_400.0),
        (25_496_450.0, 6_672_430.0),
        (25_496_400.0, 6_672_430.0),
    ]);
    let draft = service.create(demo_cable_report(area), &reference, &user)?;
    println!(
        "- Draft {} stored for project {} -> {}",
        draft.id,
        draft.project,
        draft.state().label()
    );

    let submitted = service.submit(draft.id, &user)?;
    let registry_id = match submitted.registry_id {
        Some(registry_id) => registry_id,
        None => {
            println!("  Submission did not reach the registry");
            return Ok(());
        }
    };
    println!(
        "- Submitted as {} (registry id {}) -> {}",
        submitted.registry_identifier.as_deref().unwrap_or("-"),
        registry_id,
        submitted.state().label()
    );

    service.submit(draft.id, &user)?;
    println!(
        "  Repeated submit issued {} registry write(s) in total",
        registry.writes().map_err(registry_error)?
    );

    if args.skip_history {
        return Ok(());
    }

    let now = Utc::now();
    registry
        .advance(registry_id, RegistryStatus::Handling)
        .map_err(registry_error)?;
    let processor = HistoryProcessor::new(store.clone(), store);
    let summary = processor.handle_history_batch(
        vec![
            StatusEvent {
                registry_id,
                event_time: now - Duration::minutes(5),
                status: RegistryStatus::Handling,
                identifier: None,
            },
            StatusEvent {
                registry_id,
                event_time: now - Duration::minutes(30),
                status: RegistryStatus::Pending,
                identifier: None,
            },
        ],
        now,
    )?;
    let current = service.get_by_id(draft.id)?;
    println!(
        "- History batch: {} events, {} applied -> {}",
        summary.events,
        summary.applied,
        current.state().label()
    );

    match service.update_data(draft.id, current.data.clone(), &user) {
        Err(HakemusServiceError::AlreadyProcessing { .. }) => {
            println!("  Edits refused while the registry is handling the application")
        }
        Err(err) => return Err(err.into()),
        Ok(_) => println!("  Unchanged payload accepted as a no-op"),
    }

    registry
        .publish_decision(registry_id, b"%PDF-1.7 demo".to_vec())
        .map_err(registry_error)?;
    let decision = service.fetch_decision_document(draft.id)?;
    println!(
        "- Decision available as {}.pdf ({} bytes)",
        decision.filename,
        decision.bytes.len()
    );

    Ok(())
}

fn registry_error(err: RegistryClientError) -> AppError {
    AppError::Workflow(HakemusServiceError::RegistryUnreachable(err.to_string()))
}
