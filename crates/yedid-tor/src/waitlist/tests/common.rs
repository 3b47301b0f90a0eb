use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::waitlist::backend::{BackendError, BranchLists, MemoryStore, WaitlistBackend};
use crate::waitlist::domain::{Answer, Checklist, ListKind, PersonRecord, RecordKey};
use crate::waitlist::service::WaitlistService;
use crate::waitlist::taxonomy::{Facility, Taxonomy};

pub(super) const FACILITY: &str = "X";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).expect("valid date")
}

pub(super) fn taxonomy() -> Taxonomy {
    Taxonomy::new(vec![Facility::new(FACILITY, ["see all", "A", "B"])])
}

pub(super) fn avi() -> PersonRecord {
    PersonRecord::new("Avi")
        .with_date_added("2024-01-01")
        .with_checklist(Checklist::all_yes())
}

pub(super) fn ben() -> PersonRecord {
    PersonRecord::new("Ben")
        .with_date_added("2024-06-01")
        .with_checklist(Checklist {
            committee_approval: Answer::Yes,
            medical_report: Answer::Yes,
            ..Checklist::default()
        })
}

pub(super) fn service_with<B>(backend: Arc<B>) -> WaitlistService<B>
where
    B: WaitlistBackend + 'static,
{
    WaitlistService::new(backend, taxonomy()).with_clock(today)
}

pub(super) fn build_service() -> (WaitlistService<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (service_with(store.clone()), store)
}

/// Avi waiting in A, Ben waiting in B.
pub(super) fn seeded_service() -> (WaitlistService<MemoryStore>, Arc<MemoryStore>) {
    let (service, store) = build_service();
    service.add(FACILITY, "A", avi()).expect("add avi");
    service.add(FACILITY, "B", ben()).expect("add ben");
    (service, store)
}

pub(super) fn names(records: &[PersonRecord]) -> Vec<&str> {
    records.iter().map(|record| record.name.as_str()).collect()
}

/// Memory store whose deletes on one list fail until healed.
pub(super) struct FailingDeleteStore {
    inner: MemoryStore,
    failing_list: ListKind,
    healed: AtomicBool,
}

impl FailingDeleteStore {
    pub(super) fn failing(list: ListKind) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_list: list,
            healed: AtomicBool::new(false),
        }
    }

    pub(super) fn heal(&self) {
        self.healed.store(true, Ordering::SeqCst);
    }
}

impl WaitlistBackend for FailingDeleteStore {
    fn name(&self) -> &'static str {
        "failing-delete"
    }

    fn fetch_all(&self, list: ListKind, facility: &Facility) -> Result<BranchLists, BackendError> {
        self.inner.fetch_all(list, facility)
    }

    fn append(
        &self,
        list: ListKind,
        facility: &Facility,
        branch: &str,
        record: &PersonRecord,
    ) -> Result<(), BackendError> {
        self.inner.append(list, facility, branch, record)
    }

    fn delete(
        &self,
        list: ListKind,
        facility: &Facility,
        key: &RecordKey,
    ) -> Result<usize, BackendError> {
        if list == self.failing_list && !self.healed.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("delete timed out".to_string()));
        }
        self.inner.delete(list, facility, key)
    }

    fn update(
        &self,
        list: ListKind,
        facility: &Facility,
        key: &RecordKey,
        record: &PersonRecord,
    ) -> Result<(), BackendError> {
        self.inner.update(list, facility, key, record)
    }
}

/// Backend that is down for every call.
pub(super) struct UnavailableStore;

impl WaitlistBackend for UnavailableStore {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn fetch_all(&self, _list: ListKind, _facility: &Facility) -> Result<BranchLists, BackendError> {
        Err(BackendError::Unavailable("database offline".to_string()))
    }

    fn append(
        &self,
        _list: ListKind,
        _facility: &Facility,
        _branch: &str,
        _record: &PersonRecord,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unavailable("database offline".to_string()))
    }

    fn delete(
        &self,
        _list: ListKind,
        _facility: &Facility,
        _key: &RecordKey,
    ) -> Result<usize, BackendError> {
        Err(BackendError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _list: ListKind,
        _facility: &Facility,
        _key: &RecordKey,
        _record: &PersonRecord,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
