//! Header row plus cell rows to records and back. Shared by the workbook
//! store and the published-sheet source.

use crate::waitlist::domain::{ListKind, PersonRecord};
use crate::waitlist::translator::{FieldTranslator, FieldValue, NativeRecord};

/// Records of one branch sheet. Rows without a name are skipped; cells under
/// headers the profile does not recognise are kept in `extras`.
pub(crate) fn records_from_rows<I>(
    translator: &FieldTranslator,
    list: ListKind,
    headers: &[String],
    rows: I,
    facility: &str,
    branch: &str,
) -> Vec<PersonRecord>
where
    I: IntoIterator<Item = Vec<FieldValue>>,
{
    let Some(name_column) = translator.resolve_name_column(headers, list) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in rows {
        let Some(name) = row.get(name_column).and_then(FieldValue::as_text) else {
            continue;
        };

        let native: NativeRecord = headers.iter().cloned().zip(row.iter().cloned()).collect();
        let mut record = translator.from_backend(&native, list);
        record.name = name;

        for (index, (header, cell)) in headers.iter().zip(&row).enumerate() {
            let header = header.trim();
            if index == name_column || header.is_empty() || translator.recognises(list, header) {
                continue;
            }
            if let Some(text) = cell.as_text() {
                record.extras.insert(header.to_string(), text);
            }
        }

        record.stamp(facility, branch);
        records.push(record);
    }
    records
}

/// Header row and text rows for one branch sheet: the profile's columns, then
/// every extra column the records carry in first-seen order.
pub(crate) fn rows_from_records(
    translator: &FieldTranslator,
    list: ListKind,
    records: &[PersonRecord],
) -> (Vec<String>, Vec<Vec<String>>) {
    let columns = translator.columns(list);
    let mut extra_columns: Vec<&str> = Vec::new();
    for record in records {
        for column in record.extras.keys() {
            if !translator.recognises(list, column) && !extra_columns.contains(&column.as_str()) {
                extra_columns.push(column.as_str());
            }
        }
    }

    let profile = translator.profile();
    let rows = records
        .iter()
        .map(|record| {
            let native = translator.to_backend(record, list);
            let mut row: Vec<String> = columns
                .iter()
                .map(|column| {
                    native
                        .get(*column)
                        .map(|value| value.to_cell(profile))
                        .unwrap_or_default()
                })
                .collect();
            row.extend(
                extra_columns
                    .iter()
                    .map(|column| record.extras.get(*column).cloned().unwrap_or_default()),
            );
            row
        })
        .collect();

    let headers = columns
        .iter()
        .chain(extra_columns.iter())
        .map(|column| column.to_string())
        .collect();
    (headers, rows)
}
