use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use super::backend::{BackendError, BranchLists, WaitlistBackend};
use super::domain::{ListKind, PersonRecord, RecordFingerprint, RecordPatch, ValidationError};
use super::statistics::{self, AggregateReport};
use super::taxonomy::{BranchScope, Facility, Taxonomy, TaxonomyError};

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct FacilitySnapshot {
    waiting: BranchLists,
    accepted: BranchLists,
}

impl FacilitySnapshot {
    fn lists(&self, list: ListKind) -> &BranchLists {
        match list {
            ListKind::Waiting => &self.waiting,
            ListKind::Accepted => &self.accepted,
        }
    }

    fn lists_mut(&mut self, list: ListKind) -> &mut BranchLists {
        match list {
            ListKind::Waiting => &mut self.waiting,
            ListKind::Accepted => &mut self.accepted,
        }
    }
}

/// Outcome of reloading one facility from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub facility: String,
    pub waiting: usize,
    pub accepted: usize,
    pub warnings: Vec<String>,
}

/// Records found in both lists, and how many waiting copies were removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub facility: String,
    pub duplicates: Vec<RecordFingerprint>,
    pub repaired: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Promote,
    Demote,
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveDirection::Promote => f.write_str("promotion"),
            MoveDirection::Demote => f.write_str("demotion"),
        }
    }
}

/// The insert half of a move succeeded but the delete half did not. Unless the
/// source copy had already vanished, the record is present in both lists until
/// [`WaitlistService::reconcile`] runs.
#[derive(Debug, thiserror::Error)]
#[error("{direction} of '{name}' is incomplete, {}: {source}", leftover(.from, .source))]
pub struct PartialMoveFailure {
    pub name: String,
    pub direction: MoveDirection,
    pub from: ListKind,
    pub source: BackendError,
}

impl PartialMoveFailure {
    /// True when the source copy is still stored beside the moved one.
    pub fn duplicated(&self) -> bool {
        !self.source.is_not_found()
    }
}

fn leftover(from: &ListKind, source: &BackendError) -> String {
    if source.is_not_found() {
        format!("the {} copy was already gone", from.label())
    } else {
        "record is now in both lists".to_string()
    }
}

/// Facility/branch-scoped operations over a backend, with a per-facility
/// snapshot that is loaded lazily and reloaded on [`refresh`](Self::refresh).
pub struct WaitlistService<B: ?Sized> {
    backend: Arc<B>,
    taxonomy: Arc<Taxonomy>,
    snapshots: Mutex<HashMap<String, FacilitySnapshot>>,
    clock: Clock,
}

impl<B> WaitlistService<B>
where
    B: WaitlistBackend + ?Sized,
{
    pub fn new(backend: Arc<B>, taxonomy: Taxonomy) -> Self {
        Self {
            backend,
            taxonomy: Arc::new(taxonomy),
            snapshots: Mutex::new(HashMap::new()),
            clock: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Replaces the source of "today" used for acceptance dates and wait times.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Reloads both lists of a facility. Load failures become warnings.
    pub fn refresh(&self, facility: &str) -> Result<LoadReport, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;
        let (snapshot, warnings) = self.load(facility);
        let report = LoadReport {
            facility: facility.name.clone(),
            waiting: snapshot.waiting.total(),
            accepted: snapshot.accepted.total(),
            warnings,
        };
        self.lock().insert(facility.name.clone(), snapshot);
        info!(
            facility = %report.facility,
            waiting = report.waiting,
            accepted = report.accepted,
            warnings = report.warnings.len(),
            "snapshot refreshed"
        );
        Ok(report)
    }

    pub fn refresh_all(&self) -> Vec<LoadReport> {
        self.taxonomy
            .facilities()
            .iter()
            .filter_map(|facility| self.refresh(&facility.name).ok())
            .collect()
    }

    /// Drops every cached facility; the next operation reloads from the backend.
    pub fn invalidate(&self) {
        self.lock().clear();
        info!("snapshot invalidated");
    }

    pub fn list(&self, facility: &str, scope: &str) -> Result<Vec<PersonRecord>, WaitlistError> {
        self.list_in(ListKind::Waiting, facility, scope)
    }

    pub fn list_accepted(
        &self,
        facility: &str,
        scope: &str,
    ) -> Result<Vec<PersonRecord>, WaitlistError> {
        self.list_in(ListKind::Accepted, facility, scope)
    }

    /// Full branch-by-branch snapshot of one list.
    pub fn lists(&self, facility: &str, list: ListKind) -> Result<BranchLists, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;
        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);
        Ok(snapshot.lists(list).clone())
    }

    pub fn add(
        &self,
        facility: &str,
        branch: &str,
        record: PersonRecord,
    ) -> Result<PersonRecord, WaitlistError> {
        let mut record = record.validated()?;
        let facility = self.taxonomy.facility(facility)?;
        let branch = facility.storage_branch(branch)?;
        record.stamp(&facility.name, &branch);
        record.original_branch = None;
        record.date_accepted = None;

        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);
        self.backend
            .append(ListKind::Waiting, facility, &branch, &record)?;
        snapshot.waiting.push(&branch, record.clone());

        info!(facility = %facility.name, branch = %branch, name = %record.name, "record added");
        Ok(record)
    }

    /// Removes the first waiting record with this name in scope.
    pub fn remove(
        &self,
        facility: &str,
        scope: &str,
        name: &str,
    ) -> Result<PersonRecord, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;
        let scope = facility.scope(scope)?;

        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);
        let found = snapshot
            .waiting
            .find(facility.branches_in(&scope), name)
            .cloned()
            .ok_or_else(|| WaitlistError::not_found(ListKind::Waiting, facility, &scope, name))?;

        let key = found.key();
        self.backend.delete(ListKind::Waiting, facility, &key)?;
        snapshot.waiting.remove_matching(&key);

        info!(facility = %facility.name, branch = %found.branch, name, "record removed");
        Ok(found)
    }

    pub fn edit(
        &self,
        facility: &str,
        scope: &str,
        name: &str,
        patch: &RecordPatch,
    ) -> Result<PersonRecord, WaitlistError> {
        self.edit_in(ListKind::Waiting, facility, scope, name, patch)
    }

    pub fn edit_accepted(
        &self,
        facility: &str,
        scope: &str,
        name: &str,
        patch: &RecordPatch,
    ) -> Result<PersonRecord, WaitlistError> {
        self.edit_in(ListKind::Accepted, facility, scope, name, patch)
    }

    /// Moves a waiting record into the accepted list of `target_branch`.
    ///
    /// A concrete source branch is searched first, then every other branch in
    /// declaration order. The accepted copy is written before the waiting copy
    /// is deleted.
    pub fn promote_to_accepted(
        &self,
        facility: &str,
        source_scope: &str,
        target_branch: &str,
        name: &str,
    ) -> Result<PersonRecord, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;
        let source = facility.scope(source_scope)?;
        let target = facility.storage_branch(target_branch)?;
        let today = self.today();

        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);
        let found = snapshot
            .waiting
            .find(preferred_order(facility, &source), name)
            .cloned()
            .ok_or_else(|| WaitlistError::not_found(ListKind::Waiting, facility, &source, name))?;

        let mut accepted = found.clone();
        accepted.original_branch = Some(found.branch.clone());
        accepted.date_accepted = Some(today);
        accepted.stamp(&facility.name, &target);

        self.move_record(snapshot, facility, MoveDirection::Promote, &found, accepted)
    }

    /// Moves an accepted record back to the waiting list of `target_branch`.
    /// The accepted record's wait date becomes its intake date again.
    pub fn demote_to_waiting(
        &self,
        facility: &str,
        target_branch: &str,
        name: &str,
    ) -> Result<PersonRecord, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;
        let target = facility.storage_branch(target_branch)?;
        let target_scope = BranchScope::Branch(target.clone());

        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);
        let found = snapshot
            .accepted
            .find(preferred_order(facility, &target_scope), name)
            .cloned()
            .ok_or_else(|| {
                WaitlistError::not_found(ListKind::Accepted, facility, &BranchScope::All, name)
            })?;

        let mut waiting = found.clone();
        waiting.original_branch = None;
        waiting.date_accepted = None;
        waiting.stamp(&facility.name, &target);

        self.move_record(snapshot, facility, MoveDirection::Demote, &found, waiting)
    }

    /// Waiting-list aggregates for a scope, as of today.
    pub fn statistics(
        &self,
        facility: &str,
        scope: &str,
    ) -> Result<AggregateReport, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;
        let scope = facility.scope(scope)?;
        let today = self.today();

        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);
        Ok(statistics::aggregate(facility, &scope, &snapshot.waiting, today))
    }

    /// Finds people present in both lists (same name and wait date), which is
    /// what an interrupted move leaves behind. With `repair`, the waiting copy
    /// is deleted so the placement stands.
    pub fn reconcile(
        &self,
        facility: &str,
        repair: bool,
    ) -> Result<ReconcileReport, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;

        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);

        let accepted: Vec<RecordFingerprint> = snapshot
            .accepted
            .branches()
            .flat_map(|entry| entry.records.iter().map(PersonRecord::fingerprint))
            .collect();
        let mut stranded: Vec<PersonRecord> = snapshot
            .waiting
            .branches()
            .flat_map(|entry| entry.records.iter())
            .filter(|record| accepted.contains(&record.fingerprint()))
            .cloned()
            .collect();
        let mut seen = HashSet::new();
        stranded.retain(|record| seen.insert(record.key()));

        let mut duplicates: Vec<RecordFingerprint> =
            stranded.iter().map(PersonRecord::fingerprint).collect();
        duplicates.sort();
        duplicates.dedup();

        let mut repaired = 0;
        if repair {
            for record in &stranded {
                let key = record.key();
                repaired += self.backend.delete(ListKind::Waiting, facility, &key)?;
                snapshot.waiting.remove_matching(&key);
            }
            info!(facility = %facility.name, repaired, "duplicates repaired");
        } else if !duplicates.is_empty() {
            warn!(
                facility = %facility.name,
                duplicates = duplicates.len(),
                "records present in both lists"
            );
        }

        Ok(ReconcileReport {
            facility: facility.name.clone(),
            duplicates,
            repaired,
        })
    }

    fn list_in(
        &self,
        list: ListKind,
        facility: &str,
        scope: &str,
    ) -> Result<Vec<PersonRecord>, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;
        let scope = facility.scope(scope)?;

        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);
        Ok(snapshot.lists(list).flatten(facility.branches_in(&scope)))
    }

    fn edit_in(
        &self,
        list: ListKind,
        facility: &str,
        scope: &str,
        name: &str,
        patch: &RecordPatch,
    ) -> Result<PersonRecord, WaitlistError> {
        let facility = self.taxonomy.facility(facility)?;
        let scope = facility.scope(scope)?;
        let target = match &patch.branch {
            Some(label) => Some(facility.storage_branch(label)?),
            None => None,
        };

        let mut snapshots = self.lock();
        let snapshot = self.loaded(&mut snapshots, facility);
        let lists = snapshot.lists_mut(list);
        let found = lists
            .find(facility.branches_in(&scope), name)
            .cloned()
            .ok_or_else(|| WaitlistError::not_found(list, facility, &scope, name))?;

        let mut updated = found.clone();
        patch.apply_to(&mut updated);
        let branch = target.unwrap_or_else(|| found.branch.clone());
        updated.stamp(&facility.name, &branch);
        let updated = updated.validated()?;

        let key = found.key();
        self.backend.update(list, facility, &key, &updated)?;
        lists.replace_matching(&key, updated.clone());

        info!(
            list = list.label(),
            facility = %facility.name,
            branch = %updated.branch,
            name = %updated.name,
            "record edited"
        );
        Ok(updated)
    }

    fn move_record(
        &self,
        snapshot: &mut FacilitySnapshot,
        facility: &Facility,
        direction: MoveDirection,
        found: &PersonRecord,
        moved: PersonRecord,
    ) -> Result<PersonRecord, WaitlistError> {
        let (from, to) = match direction {
            MoveDirection::Promote => (ListKind::Waiting, ListKind::Accepted),
            MoveDirection::Demote => (ListKind::Accepted, ListKind::Waiting),
        };

        self.backend.append(to, facility, &moved.branch, &moved)?;
        snapshot.lists_mut(to).push(&moved.branch, moved.clone());

        let key = found.key();
        match self.backend.delete(from, facility, &key) {
            Ok(_) => {
                snapshot.lists_mut(from).remove_matching(&key);
                info!(
                    %direction,
                    facility = %facility.name,
                    from = %found.branch,
                    to = %moved.branch,
                    name = %moved.name,
                    "record moved"
                );
                Ok(moved)
            }
            Err(source) => {
                let failure = PartialMoveFailure {
                    name: moved.name,
                    direction,
                    from,
                    source,
                };
                if failure.duplicated() {
                    warn!(
                        %direction,
                        facility = %facility.name,
                        name = %failure.name,
                        error = %failure.source,
                        "move left the record in both lists"
                    );
                } else {
                    // Someone else already removed the source row.
                    snapshot.lists_mut(from).remove_matching(&key);
                    warn!(
                        %direction,
                        facility = %facility.name,
                        name = %failure.name,
                        "source copy vanished before the move finished"
                    );
                }
                Err(failure.into())
            }
        }
    }

    fn load(&self, facility: &Facility) -> (FacilitySnapshot, Vec<String>) {
        let waiting = self.backend.load_all(ListKind::Waiting, facility);
        let accepted = self.backend.load_all(ListKind::Accepted, facility);
        let warnings = [waiting.warning, accepted.warning]
            .into_iter()
            .flatten()
            .collect();
        (
            FacilitySnapshot {
                waiting: waiting.lists,
                accepted: accepted.lists,
            },
            warnings,
        )
    }

    fn loaded<'a>(
        &self,
        snapshots: &'a mut HashMap<String, FacilitySnapshot>,
        facility: &Facility,
    ) -> &'a mut FacilitySnapshot {
        snapshots
            .entry(facility.name.clone())
            .or_insert_with(|| self.load(facility).0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, FacilitySnapshot>> {
        self.snapshots
            .lock()
            .expect("waitlist snapshot mutex poisoned")
    }
}

/// Branch search order for a scope: a concrete branch first, then the rest.
fn preferred_order<'a>(facility: &'a Facility, scope: &'a BranchScope) -> Vec<&'a str> {
    match scope {
        BranchScope::All => facility.branches.iter().map(String::as_str).collect(),
        BranchScope::Branch(preferred) => std::iter::once(preferred.as_str())
            .chain(
                facility
                    .branches
                    .iter()
                    .map(String::as_str)
                    .filter(|branch| branch != preferred),
            )
            .collect(),
    }
}

/// Error raised by the waitlist service.
#[derive(Debug, thiserror::Error)]
pub enum WaitlistError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
    #[error("no {list} record named '{name}' in {facility}/{scope}")]
    NotFound {
        list: &'static str,
        facility: String,
        scope: String,
        name: String,
    },
    #[error(transparent)]
    Backend(BackendError),
    #[error(transparent)]
    PartialMove(#[from] PartialMoveFailure),
}

impl WaitlistError {
    fn not_found(list: ListKind, facility: &Facility, scope: &BranchScope, name: &str) -> Self {
        WaitlistError::NotFound {
            list: list.label(),
            facility: facility.name.clone(),
            scope: scope.label().to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            WaitlistError::NotFound { .. } => true,
            WaitlistError::Backend(error) => error.is_not_found(),
            _ => false,
        }
    }
}

impl From<BackendError> for WaitlistError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Validation(validation) => WaitlistError::Validation(validation),
            other => WaitlistError::Backend(other),
        }
    }
}
