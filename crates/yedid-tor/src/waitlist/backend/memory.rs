use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use super::{require_name, BackendError, BranchLists, WaitlistBackend};
use crate::waitlist::domain::{ListKind, PersonRecord, RecordKey};
use crate::waitlist::taxonomy::Facility;

type StoreKey = (ListKind, String);

/// Process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lists: Mutex<HashMap<StoreKey, BranchLists>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a facility's list, replacing whatever was stored.
    pub fn seed(&self, list: ListKind, facility: &str, lists: BranchLists) {
        self.lists
            .lock()
            .expect("memory store mutex poisoned")
            .insert((list, facility.to_string()), lists);
    }
}

impl WaitlistBackend for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch_all(&self, list: ListKind, facility: &Facility) -> Result<BranchLists, BackendError> {
        let guard = self.lists.lock().expect("memory store mutex poisoned");
        let mut lists = BranchLists::for_facility(facility);
        if let Some(stored) = guard.get(&(list, facility.name.clone())) {
            for branch in &facility.branches {
                lists
                    .records_mut(branch)
                    .extend(stored.records(branch).iter().cloned());
            }
        }
        Ok(lists)
    }

    fn append(
        &self,
        list: ListKind,
        facility: &Facility,
        branch: &str,
        record: &PersonRecord,
    ) -> Result<(), BackendError> {
        require_name(record)?;
        let mut guard = self.lists.lock().expect("memory store mutex poisoned");
        guard
            .entry((list, facility.name.clone()))
            .or_insert_with(|| BranchLists::for_facility(facility))
            .push(branch, record.clone());
        debug!(list = list.label(), facility = %facility.name, branch, "memory append");
        Ok(())
    }

    fn delete(
        &self,
        list: ListKind,
        facility: &Facility,
        key: &RecordKey,
    ) -> Result<usize, BackendError> {
        let mut guard = self.lists.lock().expect("memory store mutex poisoned");
        let removed = guard
            .get_mut(&(list, facility.name.clone()))
            .map(|lists| lists.remove_matching(key))
            .unwrap_or(0);
        if removed == 0 {
            return Err(BackendError::not_found(key));
        }
        Ok(removed)
    }

    fn update(
        &self,
        list: ListKind,
        facility: &Facility,
        key: &RecordKey,
        record: &PersonRecord,
    ) -> Result<(), BackendError> {
        require_name(record)?;
        let mut guard = self.lists.lock().expect("memory store mutex poisoned");
        let replaced = guard
            .get_mut(&(list, facility.name.clone()))
            .map(|lists| lists.replace_matching(key, record.clone()))
            .unwrap_or(false);
        if !replaced {
            return Err(BackendError::not_found(key));
        }
        Ok(())
    }
}
