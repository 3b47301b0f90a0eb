//! Waiting-list tracking for facilities and their branches.
//!
//! Records live in two lists per branch (waiting and accepted) behind a
//! [`WaitlistBackend`]. The [`WaitlistService`] scopes every operation to a
//! facility and branch, keeps a per-facility snapshot, and moves people
//! between the lists.

pub mod backend;
mod dates;
pub mod domain;
mod normalizer;
pub mod router;
pub mod service;
pub mod statistics;
pub mod taxonomy;
pub mod translator;

#[cfg(test)]
mod tests;

pub use backend::{
    BackendError, BranchList, BranchLists, HttpSheetFetcher, LoadOutcome, MemoryStore,
    PublishedSheet, PublishedSheetStore, RemoteTableStore, RestTableClient, SheetFetcher,
    SpreadsheetStore, TableTransport, WaitlistBackend,
};
pub use domain::{
    Answer, Checklist, ListKind, PersonRecord, RecordFingerprint, RecordKey, RecordPatch,
    ValidationError,
};
pub use router::waitlist_router;
pub use service::{
    LoadReport, MoveDirection, PartialMoveFailure, ReconcileReport, WaitlistError,
    WaitlistService,
};
pub use statistics::{AggregateReport, BranchStatistics, TrendPoint};
pub use taxonomy::{BranchScope, Facility, Taxonomy, TaxonomyError, SEE_ALL_LABEL};
pub use translator::{FieldTranslator, SchemaProfile};
