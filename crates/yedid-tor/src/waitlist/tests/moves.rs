use std::sync::Arc;

use super::common::{
    ben, names, seeded_service, service_with, today, FailingDeleteStore, FACILITY,
};
use crate::waitlist::backend::WaitlistBackend;
use crate::waitlist::domain::{ListKind, PersonRecord, RecordKey};
use crate::waitlist::service::{MoveDirection, WaitlistError};

#[test]
fn promote_falls_back_to_the_branch_holding_the_person() {
    let (service, store) = seeded_service();

    let accepted = service
        .promote_to_accepted(FACILITY, "A", "B", "Ben")
        .expect("promote ben");
    assert_eq!(accepted.branch, "B");
    assert_eq!(accepted.original_branch.as_deref(), Some("B"));
    assert_eq!(accepted.date_accepted, Some(today()));
    assert_eq!(accepted.date_added.as_deref(), Some("2024-06-01"));

    let waiting_b = service.list(FACILITY, "B").expect("waiting B");
    assert!(waiting_b.is_empty());
    let accepted_b = service.list_accepted(FACILITY, "B").expect("accepted B");
    assert_eq!(names(&accepted_b), vec!["Ben"]);

    let facility = service.taxonomy().facility(FACILITY).expect("facility");
    let stored_waiting = store
        .fetch_all(ListKind::Waiting, facility)
        .expect("fetch waiting");
    let stored_accepted = store
        .fetch_all(ListKind::Accepted, facility)
        .expect("fetch accepted");
    assert!(stored_waiting.records("B").is_empty());
    assert_eq!(stored_accepted.records("B").len(), 1);
}

#[test]
fn promote_prefers_the_named_source_branch() {
    let (service, _) = seeded_service();
    service
        .add(FACILITY, "A", PersonRecord::new("Ben").with_date_added("2023-12-01"))
        .expect("second ben in A");

    let accepted = service
        .promote_to_accepted(FACILITY, "A", "A", "Ben")
        .expect("promote ben from A");
    assert_eq!(accepted.original_branch.as_deref(), Some("A"));
    assert_eq!(accepted.date_added.as_deref(), Some("2023-12-01"));

    let waiting_b = service.list(FACILITY, "B").expect("waiting B");
    assert_eq!(names(&waiting_b), vec!["Ben"]);
}

#[test]
fn promote_never_duplicates_a_record() {
    let (service, _) = seeded_service();
    service
        .promote_to_accepted(FACILITY, "see all", "A", "Avi")
        .expect("promote avi");

    let waiting = service.list(FACILITY, "see all").expect("waiting");
    let accepted = service.list_accepted(FACILITY, "see all").expect("accepted");
    assert_eq!(names(&waiting), vec!["Ben"]);
    assert_eq!(names(&accepted), vec!["Avi"]);

    let error = service
        .promote_to_accepted(FACILITY, "see all", "A", "Avi")
        .expect_err("avi is no longer waiting");
    assert!(error.is_not_found());
}

#[test]
fn promote_rejects_the_pseudo_branch_as_target() {
    let (service, _) = seeded_service();

    let error = service
        .promote_to_accepted(FACILITY, "A", "see all", "Avi")
        .expect_err("see all is not a target");
    assert!(matches!(error, WaitlistError::Taxonomy(_)));
    assert_eq!(service.list(FACILITY, "A").expect("waiting A").len(), 1);
}

#[test]
fn demote_returns_the_record_without_acceptance_fields() {
    let (service, _) = seeded_service();
    service
        .promote_to_accepted(FACILITY, "B", "B", "Ben")
        .expect("promote ben");

    let waiting = service
        .demote_to_waiting(FACILITY, "A", "Ben")
        .expect("demote ben");
    assert_eq!(waiting.branch, "A");
    assert!(waiting.original_branch.is_none());
    assert!(waiting.date_accepted.is_none());
    assert_eq!(waiting.date_added.as_deref(), Some("2024-06-01"));

    assert!(service
        .list_accepted(FACILITY, "see all")
        .expect("accepted")
        .is_empty());
    let waiting_a = service.list(FACILITY, "A").expect("waiting A");
    assert_eq!(names(&waiting_a), vec!["Avi", "Ben"]);
}

#[test]
fn demote_reports_missing_people() {
    let (service, _) = seeded_service();

    let error = service
        .demote_to_waiting(FACILITY, "A", "Ben")
        .expect_err("ben was never accepted");
    assert!(matches!(error, WaitlistError::NotFound { list: "accepted", .. }));
}

#[test]
fn failed_delete_reports_a_partial_move_and_reconcile_repairs_it() {
    let store = Arc::new(FailingDeleteStore::failing(ListKind::Waiting));
    let service = service_with(store.clone());
    service.add(FACILITY, "B", ben()).expect("add ben");

    let error = service
        .promote_to_accepted(FACILITY, "B", "B", "Ben")
        .expect_err("delete fails");
    match &error {
        WaitlistError::PartialMove(failure) => {
            assert_eq!(failure.name, "Ben");
            assert_eq!(failure.direction, MoveDirection::Promote);
            assert!(failure.duplicated());
            assert!(failure.to_string().contains("now in both lists"));
        }
        other => panic!("expected a partial move, got {other:?}"),
    }

    let report = service.reconcile(FACILITY, false).expect("reconcile");
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.duplicates[0].name, "Ben");
    assert_eq!(report.repaired, 0);

    let error = service
        .reconcile(FACILITY, true)
        .expect_err("repair hits the same failing delete");
    assert!(matches!(error, WaitlistError::Backend(_)));
}

#[test]
fn vanished_source_copy_is_not_reported_as_a_duplicate() {
    let (service, store) = seeded_service();
    // Loads the snapshot, then Ben disappears behind the service's back.
    assert_eq!(service.list(FACILITY, "B").expect("waiting B").len(), 1);
    let facility = service.taxonomy().facility(FACILITY).expect("facility").clone();
    store
        .delete(ListKind::Waiting, &facility, &RecordKey::new(FACILITY, "B", "Ben"))
        .expect("out-of-band delete");

    let error = service
        .promote_to_accepted(FACILITY, "B", "B", "Ben")
        .expect_err("delete finds nothing");
    match &error {
        WaitlistError::PartialMove(failure) => {
            assert!(!failure.duplicated());
            let message = failure.to_string();
            assert!(message.contains("waiting copy was already gone"), "{message}");
            assert!(!message.contains("both lists"), "{message}");
        }
        other => panic!("expected a partial move, got {other:?}"),
    }

    assert!(service.list(FACILITY, "B").expect("waiting B").is_empty());
    let report = service.reconcile(FACILITY, false).expect("reconcile");
    assert!(report.duplicates.is_empty());
}

#[test]
fn reconcile_repair_deletes_the_waiting_copy() {
    let store = Arc::new(FailingDeleteStore::failing(ListKind::Waiting));
    let service = service_with(store.clone());
    service.add(FACILITY, "B", ben()).expect("add ben");
    service
        .promote_to_accepted(FACILITY, "B", "B", "Ben")
        .expect_err("partial move");
    store.heal();

    let report = service.reconcile(FACILITY, true).expect("repair");
    assert_eq!(report.repaired, 1);
    assert!(service
        .list(FACILITY, "see all")
        .expect("waiting")
        .is_empty());
    assert_eq!(
        names(&service.list_accepted(FACILITY, "B").expect("accepted")),
        vec!["Ben"]
    );

    let facility = service.taxonomy().facility(FACILITY).expect("facility");
    let stored = store
        .fetch_all(ListKind::Waiting, facility)
        .expect("fetch waiting");
    assert_eq!(stored.total(), 0);

    let clean = service.reconcile(FACILITY, false).expect("second pass");
    assert!(clean.duplicates.is_empty());
}
