//! Remote table adapter. Both lists live in one table each; rows carry their
//! facility and branch as columns and are grouped client-side.

mod client;
mod transport;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

pub use client::RestTableClient;
pub use transport::{Filter, TableRow, TableTransport, TransportError};

use super::{require_name, BackendError, BranchLists, WaitlistBackend};
use crate::waitlist::dates::format_date;
use crate::waitlist::domain::{ListKind, PersonRecord, RecordKey};
use crate::waitlist::taxonomy::Facility;
use crate::waitlist::translator::{
    CanonicalField, FieldTranslator, FieldValue, NativeRecord, SchemaProfile,
};

pub struct RemoteTableStore<T: ?Sized> {
    transport: Arc<T>,
    translator: FieldTranslator,
}

impl<T> RemoteTableStore<T>
where
    T: TableTransport + ?Sized,
{
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            translator: FieldTranslator::new(SchemaProfile::Remote),
        }
    }

    fn column(&self, list: ListKind, field: CanonicalField) -> Result<&'static str, BackendError> {
        self.translator.column(list, field).ok_or_else(|| {
            BackendError::Unavailable(format!(
                "remote {} table has no {field:?} column",
                list.label()
            ))
        })
    }

    fn key_filters<'a>(
        &self,
        list: ListKind,
        key: &'a RecordKey,
    ) -> Result<Vec<Filter<'a>>, BackendError> {
        Ok(vec![
            (self.column(list, CanonicalField::Name)?, key.stored_name()),
            (self.column(list, CanonicalField::Facility)?, key.facility.as_str()),
            (self.column(list, CanonicalField::Branch)?, key.stored_branch()),
        ])
    }

    fn encode(&self, record: &PersonRecord, list: ListKind) -> TableRow {
        self.translator
            .to_backend(record, list)
            .into_iter()
            .map(|(column, value)| (column, to_json(value)))
            .collect()
    }

    fn decode(&self, row: &TableRow, list: ListKind) -> PersonRecord {
        let native: NativeRecord = row
            .iter()
            .map(|(column, value)| (column.clone(), from_json(value)))
            .collect();
        self.translator.from_backend(&native, list)
    }
}

impl<T> WaitlistBackend for RemoteTableStore<T>
where
    T: TableTransport + ?Sized,
{
    fn name(&self) -> &'static str {
        "remote"
    }

    fn fetch_all(&self, list: ListKind, facility: &Facility) -> Result<BranchLists, BackendError> {
        let facility_column = self.column(list, CanonicalField::Facility)?;
        let name_column = self.column(list, CanonicalField::Name)?;
        let branch_column = self.column(list, CanonicalField::Branch)?;
        let rows = self
            .transport
            .select(list.table_name(), &[(facility_column, facility.name.as_str())])?;
        debug!(table = list.table_name(), rows = rows.len(), "remote select");

        let mut lists = BranchLists::for_facility(facility);
        for row in &rows {
            let mut record = self.decode(row, list);
            record.name = record.name.trim().to_string();
            if record.name.is_empty() {
                continue;
            }

            let branch = if facility.has_branch(&record.branch) {
                record.branch.clone()
            } else if let Some(branch) = facility.branch_by_key(&record.branch) {
                branch.to_string()
            } else {
                warn!(
                    table = list.table_name(),
                    facility = %facility.name,
                    branch = %record.branch,
                    name = %record.name,
                    "dropping row with unknown branch"
                );
                continue;
            };
            record.stamp(&facility.name, &branch);
            // Later deletes and updates must filter on the row as stored.
            record.remember_stored(
                row.get(name_column).and_then(Value::as_str).unwrap_or_default(),
                row.get(branch_column).and_then(Value::as_str).unwrap_or_default(),
            );
            lists.push(&branch, record);
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
        let mut stamped = record.clone();
        stamped.stamp(&facility.name, branch);
        self.transport
            .insert(list.table_name(), &self.encode(&stamped, list))?;
        info!(table = list.table_name(), facility = %facility.name, branch, "remote insert");
        Ok(())
    }

    fn delete(
        &self,
        list: ListKind,
        _facility: &Facility,
        key: &RecordKey,
    ) -> Result<usize, BackendError> {
        let filters = self.key_filters(list, key)?;
        let removed = self.transport.delete(list.table_name(), &filters)?;
        if removed.is_empty() {
            return Err(BackendError::not_found(key));
        }
        Ok(removed.len())
    }

    fn update(
        &self,
        list: ListKind,
        _facility: &Facility,
        key: &RecordKey,
        record: &PersonRecord,
    ) -> Result<(), BackendError> {
        require_name(record)?;
        let filters = self.key_filters(list, key)?;
        let updated = self
            .transport
            .update(list.table_name(), &filters, &self.encode(record, list))?;
        if updated.is_empty() {
            return Err(BackendError::not_found(key));
        }
        Ok(())
    }
}

fn to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Text(text) => Value::String(text),
        FieldValue::Flag(flag) => Value::Bool(flag),
        FieldValue::Date(date) => Value::String(format_date(date)),
        FieldValue::Null => Value::Null,
    }
}

fn from_json(value: &Value) -> FieldValue {
    match value {
        Value::String(text) => FieldValue::Text(text.clone()),
        Value::Bool(flag) => FieldValue::Flag(*flag),
        Value::Null => FieldValue::Null,
        Value::Number(number) => FieldValue::Text(number.to_string()),
        other => FieldValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    /// In-process table API honouring equality filters.
    #[derive(Default)]
    struct FakeTables {
        tables: Mutex<HashMap<String, Vec<TableRow>>>,
    }

    fn matches(row: &TableRow, filters: &[Filter<'_>]) -> bool {
        filters
            .iter()
            .all(|(column, value)| row.get(*column).and_then(Value::as_str) == Some(*value))
    }

    impl TableTransport for FakeTables {
        fn select(
            &self,
            table: &str,
            filters: &[Filter<'_>],
        ) -> Result<Vec<TableRow>, TransportError> {
            let tables = self.tables.lock().expect("fake tables poisoned");
            Ok(tables
                .get(table)
                .map(|rows| rows.iter().filter(|row| matches(row, filters)).cloned().collect())
                .unwrap_or_default())
        }

        fn insert(&self, table: &str, row: &TableRow) -> Result<Vec<TableRow>, TransportError> {
            let mut tables = self.tables.lock().expect("fake tables poisoned");
            tables.entry(table.to_string()).or_default().push(row.clone());
            Ok(vec![row.clone()])
        }

        fn update(
            &self,
            table: &str,
            filters: &[Filter<'_>],
            row: &TableRow,
        ) -> Result<Vec<TableRow>, TransportError> {
            let mut tables = self.tables.lock().expect("fake tables poisoned");
            let mut updated = Vec::new();
            for existing in tables.entry(table.to_string()).or_default() {
                if matches(existing, filters) {
                    for (column, value) in row {
                        existing.insert(column.clone(), value.clone());
                    }
                    updated.push(existing.clone());
                }
            }
            Ok(updated)
        }

        fn delete(
            &self,
            table: &str,
            filters: &[Filter<'_>],
        ) -> Result<Vec<TableRow>, TransportError> {
            let mut tables = self.tables.lock().expect("fake tables poisoned");
            let rows = tables.entry(table.to_string()).or_default();
            let (removed, kept): (Vec<TableRow>, Vec<TableRow>) =
                rows.drain(..).partition(|row| matches(row, filters));
            *rows = kept;
            Ok(removed)
        }
    }

    struct DownTables;

    impl TableTransport for DownTables {
        fn select(&self, _: &str, _: &[Filter<'_>]) -> Result<Vec<TableRow>, TransportError> {
            Err(TransportError::Status {
                status: 503,
                body: "maintenance".to_string(),
            })
        }

        fn insert(&self, _: &str, _: &TableRow) -> Result<Vec<TableRow>, TransportError> {
            Err(TransportError::Request("connection refused".to_string()))
        }

        fn update(
            &self,
            _: &str,
            _: &[Filter<'_>],
            _: &TableRow,
        ) -> Result<Vec<TableRow>, TransportError> {
            Err(TransportError::Request("connection refused".to_string()))
        }

        fn delete(&self, _: &str, _: &[Filter<'_>]) -> Result<Vec<TableRow>, TransportError> {
            Err(TransportError::Request("connection refused".to_string()))
        }
    }

    fn facility() -> Facility {
        Facility::new("X", ["A", "B"])
    }

    fn row(value: serde_json::Value) -> TableRow {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn fetch_groups_rows_by_branch_and_drops_unknown() {
        let tables = Arc::new(FakeTables::default());
        for (name, branch) in [("Avi", "A"), ("Ben", "B"), ("Gil", "Haifa"), ("", "A")] {
            tables
                .insert(
                    "WaitingList",
                    &row(json!({
                        "id": 1,
                        "name": name,
                        "facility": "X",
                        "branch": branch,
                        "urgent_case": true,
                        "committee_approval": "כן",
                    })),
                )
                .expect("seed");
        }

        let store = RemoteTableStore::new(tables);
        let lists = store.fetch_all(ListKind::Waiting, &facility()).expect("fetch");
        assert_eq!(lists.total(), 2);
        let avi = &lists.records("A")[0];
        assert!(avi.urgent);
        assert!(avi.checklist.committee_approval.is_yes());
        assert_eq!(lists.records("B")[0].name, "Ben");
    }

    #[test]
    fn append_update_delete_are_keyed_by_branch_and_name() {
        let tables = Arc::new(FakeTables::default());
        let store = RemoteTableStore::new(tables.clone());
        let mut avi = PersonRecord::new("Avi").with_date_added("2024-01-01");
        avi.stamp("X", "A");

        store
            .append(ListKind::Accepted, &facility(), "A", &avi)
            .expect("insert");
        let stored = tables
            .select("AcceptedList", &[("name", "Avi")])
            .expect("select");
        assert_eq!(stored[0].get("date_waiting"), Some(&json!("2024-01-01")));

        let wrong_branch = RecordKey::new("X", "B", "Avi");
        assert!(store
            .delete(ListKind::Accepted, &facility(), &wrong_branch)
            .expect_err("other branch")
            .is_not_found());

        let mut edited = avi.clone();
        edited.comments = Some("called back".to_string());
        store
            .update(ListKind::Accepted, &facility(), &avi.key(), &edited)
            .expect("update");
        let lists = store.fetch_all(ListKind::Accepted, &facility()).expect("fetch");
        assert_eq!(lists.records("A")[0].comments.as_deref(), Some("called back"));

        assert_eq!(
            store
                .delete(ListKind::Accepted, &facility(), &avi.key())
                .expect("delete"),
            1
        );
    }

    #[test]
    fn rows_stored_in_non_canonical_form_can_still_be_deleted_and_updated() {
        let tables = Arc::new(FakeTables::default());
        for (name, branch) in [("Dana", "tel aviv"), (" Gil ", "Tel Aviv")] {
            tables
                .insert(
                    "WaitingList",
                    &row(json!({ "name": name, "facility": "X", "branch": branch })),
                )
                .expect("seed");
        }
        let facility = Facility::new("X", ["Tel Aviv"]);
        let store = RemoteTableStore::new(tables.clone());

        let lists = store.fetch_all(ListKind::Waiting, &facility).expect("fetch");
        let dana = lists.find(["Tel Aviv"], "Dana").cloned().expect("dana");
        let gil = lists.find(["Tel Aviv"], "Gil").cloned().expect("gil");
        assert_eq!(dana.branch, "Tel Aviv");
        assert_eq!(dana.key().stored_branch(), "tel aviv");
        assert_eq!(gil.key().stored_name(), " Gil ");

        let mut edited = gil.clone();
        edited.comments = Some("called back".to_string());
        edited.stamp("X", "Tel Aviv");
        store
            .update(ListKind::Waiting, &facility, &gil.key(), &edited)
            .expect("update gil");
        let rewritten = tables
            .select("WaitingList", &[("name", "Gil")])
            .expect("select");
        assert_eq!(rewritten.len(), 1);
        assert_eq!(rewritten[0].get("branch"), Some(&json!("Tel Aviv")));

        assert_eq!(
            store
                .delete(ListKind::Waiting, &facility, &dana.key())
                .expect("delete dana"),
            1
        );
        let left = store.fetch_all(ListKind::Waiting, &facility).expect("refetch");
        assert_eq!(left.total(), 1);
        assert!(left.records("Tel Aviv")[0].key().stored_as.is_none());
    }

    #[test]
    fn status_errors_surface_as_remote_errors() {
        let store = RemoteTableStore::new(Arc::new(DownTables));
        let error = store
            .fetch_all(ListKind::Waiting, &facility())
            .expect_err("down");
        assert!(matches!(error, BackendError::Remote { status: 503, .. }));

        let outcome = store.load_all(ListKind::Waiting, &facility());
        assert!(outcome.lists.is_empty());
        assert!(outcome.warning.is_some());
    }
}
