use crate::cli::{AddArgs, DemoteArgs, ExportArgs, ListArgs, PromoteArgs, RemoveArgs, StatsArgs};
use crate::infra::{build_service, SharedService};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use yedid_tor::config::AppConfig;
use yedid_tor::error::AppError;
use yedid_tor::telemetry;
use yedid_tor::waitlist::{Checklist, ListKind, PersonRecord, SpreadsheetStore};

#[derive(Debug, Serialize)]
struct ExportSummary {
    dir: PathBuf,
    facilities: usize,
    waiting: usize,
    accepted: usize,
}

fn open() -> Result<(AppConfig, SharedService), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let service = build_service(&config)?;
    Ok((config, service))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn list(args: ListArgs) -> Result<(), AppError> {
    let (_, service) = open()?;
    let records = if args.accepted {
        service.list_accepted(&args.facility, &args.branch)?
    } else {
        service.list(&args.facility, &args.branch)?
    };
    print_json(&records)
}

pub(crate) fn add(args: AddArgs) -> Result<(), AppError> {
    let (_, service) = open()?;
    let mut record = PersonRecord::new(args.name).with_urgent(args.urgent);
    record.date_added = args.date;
    record.address = args.address;
    record.referrer = args.referrer;
    record.comments = args.comments;
    if args.complete {
        record.checklist = Checklist::all_yes();
    }

    let added = service.add(&args.facility, &args.branch, record)?;
    print_json(&added)
}

pub(crate) fn remove(args: RemoveArgs) -> Result<(), AppError> {
    let (_, service) = open()?;
    let removed = service.remove(&args.facility, &args.branch, &args.name)?;
    print_json(&removed)
}

pub(crate) fn promote(args: PromoteArgs) -> Result<(), AppError> {
    let (_, service) = open()?;
    let accepted = service.promote_to_accepted(&args.facility, &args.from, &args.to, &args.name)?;
    print_json(&accepted)
}

pub(crate) fn demote(args: DemoteArgs) -> Result<(), AppError> {
    let (_, service) = open()?;
    let waiting = service.demote_to_waiting(&args.facility, &args.to, &args.name)?;
    print_json(&waiting)
}

pub(crate) fn stats(args: StatsArgs) -> Result<(), AppError> {
    let (_, service) = open()?;
    let report = service.statistics(&args.facility, &args.branch)?;
    print_json(&report)
}

pub(crate) fn export(args: ExportArgs) -> Result<(), AppError> {
    let (config, service) = open()?;
    let dir = args.dir.unwrap_or_else(|| config.waitlist.workbook_dir.clone());
    let store = SpreadsheetStore::new(dir.clone(), config.waitlist.translator());

    let mut summary = ExportSummary {
        dir,
        facilities: 0,
        waiting: 0,
        accepted: 0,
    };
    for facility in service.taxonomy().facilities() {
        for list in ListKind::ordered() {
            let lists = service.lists(&facility.name, list)?;
            store.write_all(list, facility, &lists)?;
            match list {
                ListKind::Waiting => summary.waiting += lists.total(),
                ListKind::Accepted => summary.accepted += lists.total(),
            }
        }
        summary.facilities += 1;
    }

    info!(
        dir = %summary.dir.display(),
        waiting = summary.waiting,
        accepted = summary.accepted,
        "workbook exported"
    );
    print_json(&summary)
}
