use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};

use super::{require_name, sheet, BackendError, BranchLists, WaitlistBackend};
use crate::waitlist::domain::{ListKind, PersonRecord, RecordKey};
use crate::waitlist::normalizer::sheet_key;
use crate::waitlist::taxonomy::Facility;
use crate::waitlist::translator::{FieldTranslator, FieldValue};

const WORKBOOK_EXTENSION: &str = "xlsx";
const MAX_SHEET_NAME: usize = 31;

/// Workbook-per-facility store. Each list of each facility is one xlsx file
/// with a sheet per real branch: `<root>/<waiting|accepted>/<facility>.xlsx`.
///
/// Sheets are matched to branches ignoring case and spaces. Mutations load the
/// whole workbook, modify it and overwrite the file.
#[derive(Debug, Clone)]
pub struct SpreadsheetStore {
    root: PathBuf,
    translator: FieldTranslator,
}

impl SpreadsheetStore {
    pub fn new(root: impl Into<PathBuf>, translator: FieldTranslator) -> Self {
        Self {
            root: root.into(),
            translator,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workbook_path(&self, list: ListKind, facility: &str) -> PathBuf {
        self.root
            .join(list.label())
            .join(format!("{}.{WORKBOOK_EXTENSION}", file_stem(facility)))
    }

    /// Overwrites the workbook with one sheet per real branch of `lists`.
    pub fn write_all(
        &self,
        list: ListKind,
        facility: &Facility,
        lists: &BranchLists,
    ) -> Result<(), BackendError> {
        let path = self.workbook_path(list, &facility.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut workbook = Workbook::new();
        for branch in &facility.branches {
            let (headers, rows) =
                sheet::rows_from_records(&self.translator, list, lists.records(branch));
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(sheet_name(branch))?;

            for (col, header) in headers.iter().enumerate() {
                worksheet.write_string(0, column_number(col)?, header)?;
            }
            for (index, row) in rows.iter().enumerate() {
                let excel_row = row_number(index + 1)?;
                for (col, cell) in row.iter().enumerate() {
                    if !cell.is_empty() {
                        worksheet.write_string(excel_row, column_number(col)?, cell)?;
                    }
                }
            }
        }
        workbook.save(&path)?;

        info!(
            list = list.label(),
            facility = %facility.name,
            records = lists.total(),
            path = %path.display(),
            "workbook written"
        );
        Ok(())
    }
}

impl WaitlistBackend for SpreadsheetStore {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    fn fetch_all(&self, list: ListKind, facility: &Facility) -> Result<BranchLists, BackendError> {
        let path = self.workbook_path(list, &facility.name);
        let mut lists = BranchLists::for_facility(facility);
        if !path.is_file() {
            debug!(path = %path.display(), "no workbook yet");
            return Ok(lists);
        }

        let mut workbook: Xlsx<_> = open_workbook(&path)?;
        let sheet_names = workbook.sheet_names();
        for branch in &facility.branches {
            let wanted = sheet_key(branch);
            let Some(matched) = sheet_names.iter().find(|name| sheet_key(name) == wanted) else {
                debug!(branch = %branch, path = %path.display(), "no sheet for branch");
                continue;
            };

            let range = workbook.worksheet_range(matched)?;
            let mut rows = range.rows();
            let Some(header_row) = rows.next() else {
                continue;
            };
            let headers: Vec<String> = header_row
                .iter()
                .map(|cell| cell_value(cell).as_text().unwrap_or_default())
                .collect();

            let records = sheet::records_from_rows(
                &self.translator,
                list,
                &headers,
                rows.map(|row| row.iter().map(cell_value).collect()),
                &facility.name,
                branch,
            );
            lists.records_mut(branch).extend(records);
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
        let mut lists = self.fetch_all(list, facility)?;
        lists.push(branch, record.clone());
        self.write_all(list, facility, &lists)
    }

    fn delete(
        &self,
        list: ListKind,
        facility: &Facility,
        key: &RecordKey,
    ) -> Result<usize, BackendError> {
        let mut lists = self.fetch_all(list, facility)?;
        let removed = lists.remove_matching(key);
        if removed == 0 {
            return Err(BackendError::not_found(key));
        }
        self.write_all(list, facility, &lists)?;
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
        let mut lists = self.fetch_all(list, facility)?;
        if !lists.replace_matching(key, record.clone()) {
            return Err(BackendError::not_found(key));
        }
        self.write_all(list, facility, &lists)
    }
}

/// Cell content in translator terms. Whole numbers lose the `.0` Excel adds,
/// so phone and id columns read back as typed.
fn cell_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty | Data::Error(_) => FieldValue::Null,
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            FieldValue::Text(text.clone())
        }
        Data::Bool(flag) => FieldValue::Flag(*flag),
        Data::Int(number) => FieldValue::Text(number.to_string()),
        Data::Float(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
            FieldValue::Text(format!("{number:.0}"))
        }
        Data::Float(number) => FieldValue::Text(number.to_string()),
        Data::DateTime(_) => cell.as_date().map_or(FieldValue::Null, FieldValue::Date),
    }
}

/// Excel sheet names are capped at 31 characters and reject `[]:*?/\`.
fn sheet_name(branch: &str) -> String {
    branch
        .trim()
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '-',
            other => other,
        })
        .take(MAX_SHEET_NAME)
        .collect()
}

fn file_stem(label: &str) -> String {
    label.trim().replace(['/', '\\'], "-")
}

fn column_number(index: usize) -> Result<u16, BackendError> {
    u16::try_from(index)
        .map_err(|_| BackendError::Unavailable(format!("sheet column {index} is out of range")))
}

fn row_number(index: usize) -> Result<u32, BackendError> {
    u32::try_from(index)
        .map_err(|_| BackendError::Unavailable(format!("sheet row {index} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waitlist::domain::{Answer, Checklist};
    use crate::waitlist::translator::SchemaProfile;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_root() -> PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "yedid-tor-sheet-{}-{id}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn facility() -> Facility {
        Facility::new("X", ["see all", "Tel Aviv", "Ramat Gan"])
    }

    fn hebrew_store(root: &Path) -> SpreadsheetStore {
        SpreadsheetStore::new(root, FieldTranslator::new(SchemaProfile::Hebrew))
    }

    /// Writes a hand-made workbook, one `(sheet, rows)` pair per sheet.
    fn write_workbook(path: &Path, sheets: &[(&str, &[&[&str]])]) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let mut workbook = Workbook::new();
        for (name, rows) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*name).expect("sheet name");
            for (r, row) in rows.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    if !cell.is_empty() {
                        worksheet
                            .write_string(r as u32, c as u16, *cell)
                            .expect("write cell");
                    }
                }
            }
        }
        workbook.save(path).expect("save workbook");
    }

    fn avi() -> PersonRecord {
        let mut record = PersonRecord::new("Avi")
            .with_date_added("2024-01-01")
            .with_checklist(Checklist::all_yes())
            .with_urgent(true);
        record.stamp("X", "Tel Aviv");
        record
    }

    #[test]
    fn append_then_fetch_round_trips_records() {
        let root = temp_root();
        let store = hebrew_store(&root);
        store
            .append(ListKind::Waiting, &facility(), "Tel Aviv", &avi())
            .expect("append");

        let lists = store.fetch_all(ListKind::Waiting, &facility()).expect("fetch");
        assert_eq!(lists.records("Tel Aviv"), &[avi()]);
        assert!(lists.records("Ramat Gan").is_empty());

        let path = root.join("waiting").join("X.xlsx");
        assert_eq!(store.workbook_path(ListKind::Waiting, "X"), path);
        let workbook: Xlsx<_> = open_workbook(&path).expect("open written workbook");
        assert_eq!(workbook.sheet_names(), vec!["Tel Aviv", "Ramat Gan"]);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn fetch_matches_sheets_by_key_and_skips_blank_names() {
        let root = temp_root();
        write_workbook(
            &root.join("waiting").join("X.xlsx"),
            &[(
                "ramatgan",
                &[
                    &["שם מלא", "תאריך", "אישור ועדה"],
                    &["Dana", "01/02/2024", "כן"],
                    &["", "2024-01-01", "לא"],
                ],
            )],
        );

        let store = hebrew_store(&root);
        let lists = store.fetch_all(ListKind::Waiting, &facility()).expect("fetch");
        let records = lists.records("Ramat Gan");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Dana");
        assert_eq!(records[0].branch, "Ramat Gan");
        assert_eq!(records[0].checklist.committee_approval, Answer::Yes);
        assert_eq!(
            records[0].intake_date(),
            chrono::NaiveDate::from_ymd_opt(2024, 2, 1)
        );

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn fetch_falls_back_to_alias_name_column() {
        let root = temp_root();
        write_workbook(
            &root.join("waiting").join("X.xlsx"),
            &[("Tel Aviv", &[&["Full Name", "notes"], &["Yael", "x"]])],
        );

        let store = hebrew_store(&root);
        let lists = store.fetch_all(ListKind::Waiting, &facility()).expect("fetch");
        assert_eq!(lists.records("Tel Aviv")[0].name, "Yael");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rewrites_keep_columns_no_profile_knows() {
        let root = temp_root();
        let path = root.join("waiting").join("X.xlsx");
        write_workbook(
            &path,
            &[("Tel Aviv", &[&["שם מלא", "טלפון"], &["Dana", "050-1234567"]])],
        );

        let store = hebrew_store(&root);
        store
            .append(ListKind::Waiting, &facility(), "Tel Aviv", &avi())
            .expect("append avi");

        let lists = store.fetch_all(ListKind::Waiting, &facility()).expect("fetch");
        let records = lists.records("Tel Aviv");
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].extras.get("טלפון").map(String::as_str),
            Some("050-1234567")
        );
        assert!(records[1].extras.is_empty());

        let mut workbook: Xlsx<_> = open_workbook(&path).expect("open");
        let range = workbook.worksheet_range("Tel Aviv").expect("sheet");
        let header: Vec<String> = range
            .rows()
            .next()
            .expect("header row")
            .iter()
            .map(|cell| cell.to_string())
            .collect();
        assert_eq!(header.first().map(String::as_str), Some("שם מלא"));
        assert_eq!(header.last().map(String::as_str), Some("טלפון"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn numeric_and_date_cells_read_as_text_and_dates() {
        assert_eq!(
            cell_value(&Data::Float(501234567.0)),
            FieldValue::Text("501234567".to_string())
        );
        assert_eq!(cell_value(&Data::Float(2.5)), FieldValue::Text("2.5".to_string()));
        assert_eq!(cell_value(&Data::Bool(true)), FieldValue::Flag(true));
        assert_eq!(cell_value(&Data::Empty), FieldValue::Null);
    }

    #[test]
    fn sheet_names_respect_excel_limits() {
        assert_eq!(sheet_name("A/B"), "A-B");
        assert_eq!(sheet_name(&"x".repeat(40)).chars().count(), MAX_SHEET_NAME);
    }

    #[test]
    fn delete_missing_record_is_not_found() {
        let root = temp_root();
        let store = hebrew_store(&root);
        let error = store
            .delete(
                ListKind::Waiting,
                &facility(),
                &RecordKey::new("X", "Tel Aviv", "Ghost"),
            )
            .expect_err("missing");
        assert!(error.is_not_found());
    }

    #[test]
    fn update_rewrites_the_sheet() {
        let root = temp_root();
        let store = hebrew_store(&root);
        store
            .append(ListKind::Waiting, &facility(), "Tel Aviv", &avi())
            .expect("append");

        let mut moved = avi();
        moved.stamp("X", "Ramat Gan");
        moved.comments = Some("moved".to_string());
        store
            .update(ListKind::Waiting, &facility(), &avi().key(), &moved)
            .expect("update");

        let lists = store.fetch_all(ListKind::Waiting, &facility()).expect("fetch");
        assert!(lists.records("Tel Aviv").is_empty());
        assert_eq!(lists.records("Ramat Gan"), &[moved]);

        let _ = fs::remove_dir_all(root);
    }
}
