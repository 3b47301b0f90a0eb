//! Persistence adapters sharing the [`WaitlistBackend`] contract.

pub mod memory;
pub mod published;
pub mod remote;
mod sheet;
pub mod spreadsheet;

use serde::Serialize;
use tracing::warn;

use super::domain::{ListKind, PersonRecord, RecordKey, ValidationError};
use super::taxonomy::Facility;

pub use memory::MemoryStore;
pub use published::{HttpSheetFetcher, PublishedSheet, PublishedSheetStore, SheetFetcher};
pub use remote::{RemoteTableStore, RestTableClient, TableRow, TableTransport, TransportError};
pub use spreadsheet::SpreadsheetStore;

/// Records of one branch, in stored order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchList {
    pub branch: String,
    pub records: Vec<PersonRecord>,
}

/// Branch to records mapping for one list of one facility. Branches keep the
/// facility's declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BranchLists {
    branches: Vec<BranchList>,
}

impl BranchLists {
    /// One empty sequence per real branch of the facility.
    pub fn for_facility(facility: &Facility) -> Self {
        Self {
            branches: facility
                .branches
                .iter()
                .map(|branch| BranchList {
                    branch: branch.clone(),
                    records: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn branches(&self) -> impl Iterator<Item = &BranchList> {
        self.branches.iter()
    }

    pub fn records(&self, branch: &str) -> &[PersonRecord] {
        self.branches
            .iter()
            .find(|entry| entry.branch == branch)
            .map(|entry| entry.records.as_slice())
            .unwrap_or(&[])
    }

    /// Mutable sequence for a branch, created at the end when missing.
    pub fn records_mut(&mut self, branch: &str) -> &mut Vec<PersonRecord> {
        let index = match self.branches.iter().position(|entry| entry.branch == branch) {
            Some(index) => index,
            None => {
                self.branches.push(BranchList {
                    branch: branch.to_string(),
                    records: Vec::new(),
                });
                self.branches.len() - 1
            }
        };
        &mut self.branches[index].records
    }

    pub fn push(&mut self, branch: &str, record: PersonRecord) {
        self.records_mut(branch).push(record);
    }

    pub fn total(&self) -> usize {
        self.branches.iter().map(|entry| entry.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// First record with the given name across `branches`, in the order given.
    pub fn find<'a, I>(&self, branches: I, name: &str) -> Option<&PersonRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        branches.into_iter().find_map(|branch| {
            self.records(branch)
                .iter()
                .find(|record| record.name == name)
        })
    }

    /// Removes every record matching the key, returning how many were removed.
    pub fn remove_matching(&mut self, key: &RecordKey) -> usize {
        let Some(entry) = self
            .branches
            .iter_mut()
            .find(|entry| entry.branch == key.branch)
        else {
            return 0;
        };
        let before = entry.records.len();
        entry.records.retain(|record| !key.matches(record));
        before - entry.records.len()
    }

    /// Overwrites the first record matching the key. A record whose branch
    /// changed moves to the end of its new branch.
    pub fn replace_matching(&mut self, key: &RecordKey, record: PersonRecord) -> bool {
        let Some(entry) = self
            .branches
            .iter_mut()
            .find(|entry| entry.branch == key.branch)
        else {
            return false;
        };
        let Some(position) = entry.records.iter().position(|current| key.matches(current)) else {
            return false;
        };

        if record.branch == key.branch {
            entry.records[position] = record;
        } else {
            entry.records.remove(position);
            let branch = record.branch.clone();
            self.push(&branch, record);
        }
        true
    }

    /// Concatenation of the given branches, in the order given.
    pub fn flatten<'a, I>(&self, branches: I) -> Vec<PersonRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        branches
            .into_iter()
            .flat_map(|branch| self.records(branch).iter().cloned())
            .collect()
    }
}

/// Result of a load that never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub lists: BranchLists,
    pub warning: Option<String>,
}

/// Uniform persistence contract for the waiting and accepted lists.
pub trait WaitlistBackend: Send + Sync {
    /// Short adapter name used in logs.
    fn name(&self) -> &'static str;

    /// Every real branch of the facility with its records.
    fn fetch_all(&self, list: ListKind, facility: &Facility) -> Result<BranchLists, BackendError>;

    /// Like [`fetch_all`](Self::fetch_all) but degrades to an empty store and
    /// a warning instead of failing.
    fn load_all(&self, list: ListKind, facility: &Facility) -> LoadOutcome {
        match self.fetch_all(list, facility) {
            Ok(lists) => LoadOutcome {
                lists,
                warning: None,
            },
            Err(error) => {
                warn!(
                    backend = self.name(),
                    list = list.label(),
                    facility = %facility.name,
                    %error,
                    "failed to load list, continuing with an empty store"
                );
                LoadOutcome {
                    lists: BranchLists::for_facility(facility),
                    warning: Some(format!(
                        "could not load {} list for {}: {error}",
                        list.label(),
                        facility.name
                    )),
                }
            }
        }
    }

    fn append(
        &self,
        list: ListKind,
        facility: &Facility,
        branch: &str,
        record: &PersonRecord,
    ) -> Result<(), BackendError>;

    /// Removes all records matching the key; `NotFound` when none did.
    fn delete(
        &self,
        list: ListKind,
        facility: &Facility,
        key: &RecordKey,
    ) -> Result<usize, BackendError>;

    /// Overwrites the record matching the key; `NotFound` when none did.
    fn update(
        &self,
        list: ListKind,
        facility: &Facility,
        key: &RecordKey,
        record: &PersonRecord,
    ) -> Result<(), BackendError>;
}

/// Error enumeration for adapter failures.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("no record named '{name}' in {facility}/{branch}")]
    NotFound {
        facility: String,
        branch: String,
        name: String,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("workbook i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sheet is malformed: {0}")]
    Csv(#[from] csv::Error),
    #[error("workbook could not be read: {0}")]
    WorkbookRead(#[from] calamine::XlsxError),
    #[error("workbook could not be written: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),
    #[error("the {0} backend is read-only")]
    ReadOnly(&'static str),
    #[error("remote table returned {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("remote transport failed: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn not_found(key: &RecordKey) -> Self {
        BackendError::NotFound {
            facility: key.facility.clone(),
            branch: key.branch.clone(),
            name: key.name.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

impl From<TransportError> for BackendError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Status { status, body } => BackendError::Remote { status, body },
            other => BackendError::Transport(other.to_string()),
        }
    }
}

pub(crate) fn require_name(record: &PersonRecord) -> Result<(), BackendError> {
    if record.name.trim().is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    Ok(())
}
